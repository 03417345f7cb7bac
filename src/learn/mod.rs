//! Corpus-trained module categorization
//!
//! A [`CategoryLearner`] is built fresh for each index pass from every known
//! module, then used to tag each of them. Nothing is persisted between passes.

use std::collections::{BTreeMap, BTreeSet};

/// What the learner needs to know about a module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleProfile {
    pub name: String,
    pub description: String,
    pub provider: Option<String>,
    pub resource_types: Vec<String>,
}

/// Resource co-occurrence and vocabulary statistics for one index pass
#[derive(Debug, Clone, Default)]
pub struct CategoryLearner {
    ignored_words: BTreeSet<String>,
    resource_counts: BTreeMap<String, usize>,
    /// Sorted, joined type list -> the distinct types seen together in one module
    clusters: BTreeMap<String, Vec<String>>,
    /// Category hint -> word -> occurrences
    text_patterns: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CategoryLearner {
    pub fn new<I, S>(ignored_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ignored_words: ignored_words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            ..Default::default()
        }
    }

    /// Build a learner from scratch over `profiles`
    pub fn train<'a, I, S>(ignored_words: I, profiles: impl IntoIterator<Item = &'a ModuleProfile>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut learner = Self::new(ignored_words);
        for profile in profiles {
            learner.learn(profile);
        }
        learner
    }

    pub fn learn(&mut self, profile: &ModuleProfile) {
        for resource_type in &profile.resource_types {
            *self.resource_counts.entry(resource_type.clone()).or_default() += 1;
        }

        let distinct: BTreeSet<&String> = profile.resource_types.iter().collect();
        if distinct.len() > 1 {
            let types: Vec<String> = distinct.into_iter().cloned().collect();
            self.clusters.insert(types.join(","), types);
        }

        if let Some(hint) = self.category_hint(&profile.name) {
            let text = format!("{} {}", profile.name, profile.description);
            let counts = self.text_patterns.entry(hint).or_default();
            for word in tokenize(&text).filter(|w| w.chars().count() > 3) {
                *counts.entry(word).or_default() += 1;
            }
        }
    }

    /// Distinct resource types seen across the corpus
    pub fn resource_type_count(&self) -> usize {
        self.resource_counts.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Categories learned for one resource type
    pub fn categories_for_resource(&self, resource_type: &str) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for types in self.clusters.values() {
            if !types.iter().any(|t| t == resource_type) {
                continue;
            }
            if let Some(category) = cluster_category(types) {
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
        }

        if categories.is_empty() {
            if let Some(fragment) = resource_type.split('_').nth(1).filter(|f| !f.is_empty()) {
                categories.push(fragment.to_string());
            }
        }

        categories
    }

    /// Learned categories whose vocabulary overlaps `text`, best match first
    pub fn text_categories(&self, text: &str) -> Vec<String> {
        let words: Vec<String> = tokenize(text).collect();
        let mut scored: Vec<(usize, &String)> = self
            .text_patterns
            .iter()
            .filter_map(|(category, counts)| {
                let score: usize = words.iter().filter_map(|w| counts.get(w)).sum();
                (score > 0).then_some((score, category))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.into_iter().map(|(_, c)| c.clone()).collect()
    }

    /// Tags for a module: resource-derived, then text-derived, then its provider
    pub fn categorize(&self, profile: &ModuleProfile) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let mut push = |tag: String| {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        };

        for resource_type in &profile.resource_types {
            for category in self.categories_for_resource(resource_type) {
                push(category);
            }
        }
        for category in self.text_categories(&format!("{} {}", profile.name, profile.description)) {
            push(category);
        }
        if let Some(provider) = profile.provider.as_deref().filter(|p| !p.is_empty()) {
            push(provider.to_string());
        }

        tags
    }

    /// First name segment longer than three characters that is not a generic word
    fn category_hint(&self, name: &str) -> Option<String> {
        name.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .find(|part| part.chars().count() > 3 && !self.ignored_words.contains(*part))
            .map(str::to_string)
    }
}

/// Most frequent type fragment across a cluster, ignoring each type's provider
/// prefix and fragments of three characters or fewer. Ties resolve to the
/// alphabetically first fragment.
fn cluster_category(types: &[String]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for resource_type in types {
        for part in resource_type.split('_').skip(1) {
            if part.chars().count() > 3 {
                *counts.entry(part).or_default() += 1;
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (word, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((word, count));
        }
    }
    best.map(|(word, _)| word.to_string())
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, description: &str, types: &[&str]) -> ModuleProfile {
        ModuleProfile {
            name: name.to_string(),
            description: description.to_string(),
            provider: Some("azurerm".to_string()),
            resource_types: types.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ignored() -> Vec<&'static str> {
        vec!["terraform", "azure", "azurerm", "module", "modules"]
    }

    #[test]
    fn test_cluster_category_uses_most_common_fragment() {
        let types = vec![
            "azurerm_virtual_network".to_string(),
            "azurerm_subnet".to_string(),
            "azurerm_network_security_group".to_string(),
        ];
        assert_eq!(cluster_category(&types).as_deref(), Some("network"));

        let single = vec!["azurerm_rg".to_string()];
        assert_eq!(cluster_category(&single), None);
    }

    #[test]
    fn test_clusters_are_order_insensitive() {
        let learner = CategoryLearner::train(
            ignored(),
            &[
                profile("terraform-azure-vnet", "", &["azurerm_subnet", "azurerm_virtual_network"]),
                profile("terraform-azure-net2", "", &["azurerm_virtual_network", "azurerm_subnet"]),
            ],
        );
        assert_eq!(learner.cluster_count(), 1);
        assert_eq!(learner.resource_type_count(), 2);
        assert_eq!(learner.resource_counts.get("azurerm_subnet"), Some(&2));
    }

    #[test]
    fn test_single_type_module_forms_no_cluster() {
        let learner = CategoryLearner::train(
            ignored(),
            &[profile("terraform-azure-kv", "", &["azurerm_key_vault", "azurerm_key_vault"])],
        );
        assert_eq!(learner.cluster_count(), 0);
        assert_eq!(learner.categories_for_resource("azurerm_key_vault"), vec!["key"]);
    }

    #[test]
    fn test_resource_categories_from_clusters() {
        let learner = CategoryLearner::train(
            ignored(),
            &[profile(
                "terraform-azure-vnet",
                "",
                &["azurerm_virtual_network", "azurerm_subnet_network_security_group_association"],
            )],
        );
        assert_eq!(learner.categories_for_resource("azurerm_subnet_network_security_group_association"), vec!["network"]);
        // unknown type falls back to its second fragment
        assert_eq!(learner.categories_for_resource("azurerm_storage_account"), vec!["storage"]);
        assert!(learner.categories_for_resource("plain").is_empty());
    }

    #[test]
    fn test_text_categories() {
        let learner = CategoryLearner::train(
            ignored(),
            &[
                profile("terraform-azure-vault", "Key vault with secrets and keys", &[]),
                profile("terraform-azure-storage", "Storage accounts and containers", &[]),
                profile("terraform-azure-kv", "no hint available", &[]),
            ],
        );

        assert_eq!(learner.text_categories("Store secrets in a vault"), vec!["vault"]);
        let both = learner.text_categories("vault storage storage");
        assert_eq!(both, vec!["storage", "vault"]);
        assert!(learner.text_categories("nothing relevant").is_empty());
    }

    #[test]
    fn test_categorize_appends_provider_once() {
        let learner = CategoryLearner::train(
            ignored(),
            &[profile("terraform-azure-vault", "secrets", &["azurerm_key_vault", "azurerm_key_vault_secret"])],
        );
        let tags = learner.categorize(&profile(
            "terraform-azure-vault",
            "secrets",
            &["azurerm_key_vault", "azurerm_key_vault_secret"],
        ));
        assert_eq!(tags, vec!["vault", "azurerm"]);

        let mut no_provider = profile("x", "", &[]);
        no_provider.provider = None;
        assert!(learner.categorize(&no_provider).is_empty());
    }
}
