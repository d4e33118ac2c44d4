#![forbid(unsafe_code)]

//! Entity tag → content component registry.
//!
//! The registry is the boundary to the renderer. It only reads
//! configurations; it never touches the store.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::config::ModalConfiguration;
use crate::data::JsonBag;

/// Builds the view for one modal from its configuration and data.
pub type ContentFn<D, V> = Rc<dyn Fn(&ModalConfiguration<D>, &D) -> V>;

/// What the renderer should show inside a modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalContent<V> {
    /// The configuration carried its own content.
    Inline(String),
    /// Output of the component registered for the entity tag.
    Component(V),
    /// No inline content and no component for this tag.
    NotConfigured { entity_tag: Option<String> },
}

impl<V> ModalContent<V> {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::NotConfigured { .. })
    }
}

/// Maps entity tags to content components.
pub struct ModalRegistry<D = JsonBag, V = String> {
    components: AHashMap<String, ContentFn<D, V>>,
}

impl<D, V> Default for ModalRegistry<D, V> {
    fn default() -> Self {
        Self {
            components: AHashMap::new(),
        }
    }
}

impl<D, V> fmt::Debug for ModalRegistry<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.components.keys().collect();
        tags.sort();
        f.debug_struct("ModalRegistry").field("tags", &tags).finish()
    }
}

impl<D, V> ModalRegistry<D, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `tag` with a component, replacing any previous one.
    pub fn register_modal(
        &mut self,
        tag: impl Into<String>,
        component: impl Fn(&ModalConfiguration<D>, &D) -> V + 'static,
    ) {
        let tag = tag.into();
        if self
            .components
            .insert(tag.clone(), Rc::new(component))
            .is_some()
        {
            tracing::debug!(%tag, "modal component replaced");
        }
    }

    /// Remove the component for `tag`. Returns `true` if one was registered.
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.components.remove(tag).is_some()
    }

    #[must_use]
    pub fn is_registered(&self, tag: &str) -> bool {
        self.components.contains_key(tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Resolve content for `config`: inline override, then the registered
    /// component for its entity tag, then [`ModalContent::NotConfigured`].
    ///
    /// `data` defaults to the configuration's own data.
    pub fn render_modal_content(
        &self,
        config: &ModalConfiguration<D>,
        data: Option<&D>,
    ) -> ModalContent<V> {
        if let Some(inline) = &config.presentation.content {
            return ModalContent::Inline(inline.clone());
        }
        let component = config
            .entity_tag
            .as_deref()
            .and_then(|tag| self.components.get(tag));
        match component {
            Some(component) => ModalContent::Component(component(config, data.unwrap_or(&config.data))),
            None => {
                tracing::debug!(entity_tag = ?config.entity_tag, "no modal component registered");
                ModalContent::NotConfigured {
                    entity_tag: config.entity_tag.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::json_bag;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> ModalRegistry {
        let mut registry: ModalRegistry = ModalRegistry::new();
        registry.register_modal("store", |config, data| {
            format!(
                "store {} ({})",
                config.entity_id.as_deref().unwrap_or("?"),
                data.get("name").and_then(|v| v.as_str()).unwrap_or("unnamed")
            )
        });
        registry
    }

    #[test]
    fn registered_component_renders() {
        let config = ModalConfiguration::entity("store", "7")
            .with_data(json_bag(json!({ "name": "Depot" })));
        assert_eq!(
            registry().render_modal_content(&config, None),
            ModalContent::Component("store 7 (Depot)".to_string())
        );
    }

    #[test]
    fn explicit_data_overrides_config_data() {
        let config = ModalConfiguration::entity("store", "7");
        let data = json_bag(json!({ "name": "Annex" }));
        assert_eq!(
            registry().render_modal_content(&config, Some(&data)),
            ModalContent::Component("store 7 (Annex)".to_string())
        );
    }

    #[test]
    fn inline_content_wins() {
        let config = ModalConfiguration::entity("store", "7").with_content("Are you sure?");
        assert_eq!(
            registry().render_modal_content(&config, None),
            ModalContent::Inline("Are you sure?".to_string())
        );
    }

    #[test]
    fn unknown_tag_is_not_configured() {
        let config: ModalConfiguration = ModalConfiguration::entity("refund", "1");
        let content = registry().render_modal_content(&config, None);
        assert!(!content.is_configured());
        assert_eq!(
            content,
            ModalContent::NotConfigured {
                entity_tag: Some("refund".to_string())
            }
        );
    }

    #[test]
    fn register_and_unregister() {
        let mut registry = registry();
        assert!(registry.is_registered("store"));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("store"));
        assert!(!registry.unregister("store"));
        assert!(registry.is_empty());
    }
}
