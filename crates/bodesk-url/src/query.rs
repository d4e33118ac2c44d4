#![forbid(unsafe_code)]

//! Query-string projection of the active modal.
//!
//! | Key | Value |
//! |-----|-------|
//! | `modal` | `true` when a modal is open |
//! | `modalEntity` | entity tag |
//! | `modalId` | entity id |
//! | `modalMode` | `view`, `edit`, `create`, `delete`, `details`, `settings` |
//! | `modalTab` | active tab id |
//! | `modalSize` | `sm`, `md`, `lg`, `xl`, `full` |
//! | `mp_<name>` | extension parameter `<name>` |
//!
//! Keys are written in the order above, extension parameters sorted by name.
//! Non-modal keys in the query are preserved in their original order.

use std::collections::BTreeMap;

use bodesk_modal::{ModalConfiguration, ModalMode, ModalSize};
use url::form_urlencoded;

pub const KEY_OPEN: &str = "modal";
pub const KEY_ENTITY: &str = "modalEntity";
pub const KEY_ID: &str = "modalId";
pub const KEY_MODE: &str = "modalMode";
pub const KEY_TAB: &str = "modalTab";
pub const KEY_SIZE: &str = "modalSize";
/// Prefix of extension parameters.
pub const PARAM_PREFIX: &str = "mp_";

const FIXED_KEYS: [&str; 6] = [KEY_OPEN, KEY_ENTITY, KEY_ID, KEY_MODE, KEY_TAB, KEY_SIZE];

/// Whether `key` belongs to the modal projection.
#[must_use]
pub fn is_modal_key(key: &str) -> bool {
    FIXED_KEYS.contains(&key) || key.starts_with(PARAM_PREFIX)
}

/// The address-bar view of one open modal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalQuery {
    pub entity_tag: Option<String>,
    pub entity_id: Option<String>,
    pub mode: Option<ModalMode>,
    pub tab: Option<String>,
    /// `None` for the default size, which is never written.
    pub size: Option<ModalSize>,
    pub params: BTreeMap<String, String>,
}

impl ModalQuery {
    /// Project the routing fields of a configuration.
    #[must_use]
    pub fn from_config<D>(config: &ModalConfiguration<D>) -> Self {
        let p = &config.presentation;
        Self {
            entity_tag: config.entity_tag.clone(),
            entity_id: config.entity_id.clone(),
            mode: config.mode,
            tab: p.active_tab.clone(),
            size: (p.size != ModalSize::default()).then_some(p.size),
            params: config.params.clone(),
        }
    }

    /// A configuration that reopens this modal.
    #[must_use]
    pub fn to_config<D: Default>(&self) -> ModalConfiguration<D> {
        let mut config = ModalConfiguration::default();
        config.entity_tag = self.entity_tag.clone();
        config.entity_id = self.entity_id.clone();
        config.mode = self.mode;
        config.presentation.active_tab = self.tab.clone();
        config.presentation.size = self.size.unwrap_or_default();
        config.params = self.params.clone();
        config
    }

    /// Key/value pairs in wire order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(KEY_OPEN.to_owned(), "true".to_owned())];
        let mut push = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                pairs.push((key.to_owned(), value.to_owned()));
            }
        };
        push(KEY_ENTITY, self.entity_tag.as_deref());
        push(KEY_ID, self.entity_id.as_deref());
        push(KEY_MODE, self.mode.map(ModalMode::as_str));
        push(KEY_TAB, self.tab.as_deref());
        push(KEY_SIZE, self.size.map(ModalSize::as_str));
        pairs.extend(
            self.params
                .iter()
                .map(|(name, value)| (format!("{PARAM_PREFIX}{name}"), value.clone())),
        );
        pairs
    }

    /// Encoded query string (no leading `?`).
    #[must_use]
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_pairs())
            .finish()
    }

    /// Read a modal from a query string. `None` unless `modal=true`.
    ///
    /// Unknown mode or size values are dropped rather than rejected, so a
    /// hand-edited link still opens the modal with defaults.
    #[must_use]
    pub fn parse(query: &str) -> Option<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut open = false;
        let mut out = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                KEY_OPEN => open = value == "true",
                KEY_ENTITY => out.entity_tag = Some(value.into_owned()),
                KEY_ID => out.entity_id = Some(value.into_owned()),
                KEY_MODE => {
                    out.mode = value
                        .parse()
                        .inspect_err(|err| tracing::debug!(%err, "ignoring modal mode"))
                        .ok();
                }
                KEY_TAB => out.tab = Some(value.into_owned()),
                KEY_SIZE => {
                    out.size = value
                        .parse()
                        .inspect_err(|err| tracing::debug!(%err, "ignoring modal size"))
                        .ok()
                        .filter(|size| *size != ModalSize::default());
                }
                other => {
                    if let Some(name) = other.strip_prefix(PARAM_PREFIX) {
                        out.params.insert(name.to_owned(), value.into_owned());
                    }
                }
            }
        }
        open.then_some(out)
    }

    /// Replace the modal keys in `query` with this projection.
    #[must_use]
    pub fn apply_to(&self, query: &str) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(retained_pairs(query));
        serializer.extend_pairs(self.to_pairs());
        serializer.finish()
    }
}

fn retained_pairs(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| !is_modal_key(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Remove every modal key (extension parameters included) from `query`.
#[must_use]
pub fn strip(query: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(retained_pairs(query))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodesk_modal::JsonBag;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_modal_encodes_three_keys() {
        let config: ModalConfiguration = ModalConfiguration::entity("x", "1");
        assert_eq!(
            ModalQuery::from_config(&config).to_query_string(),
            "modal=true&modalEntity=x&modalId=1"
        );
    }

    #[test]
    fn full_projection_key_order() {
        let config: ModalConfiguration = ModalConfiguration::entity("cashier", "42")
            .with_mode(ModalMode::Edit)
            .with_tabs(["profile", "shifts"])
            .with_size(ModalSize::Lg)
            .with_param("z", "last")
            .with_param("from", "list");
        assert_eq!(
            ModalQuery::from_config(&config).to_query_string(),
            "modal=true&modalEntity=cashier&modalId=42&modalMode=edit&modalTab=profile\
             &modalSize=lg&mp_from=list&mp_z=last"
        );
    }

    #[test]
    fn parse_requires_modal_true() {
        assert_eq!(ModalQuery::parse(""), None);
        assert_eq!(ModalQuery::parse("modalEntity=x"), None);
        assert_eq!(ModalQuery::parse("modal=false&modalEntity=x"), None);
        assert!(ModalQuery::parse("?modal=true").is_some());
    }

    #[test]
    fn parse_reads_every_key() {
        let q = ModalQuery::parse(
            "page=2&modal=true&modalEntity=store&modalId=9&modalMode=details\
             &modalTab=staff&modalSize=xl&mp_ref=email%20link",
        )
        .expect("modal encoded");
        assert_eq!(q.entity_tag.as_deref(), Some("store"));
        assert_eq!(q.entity_id.as_deref(), Some("9"));
        assert_eq!(q.mode, Some(ModalMode::Details));
        assert_eq!(q.tab.as_deref(), Some("staff"));
        assert_eq!(q.size, Some(ModalSize::Xl));
        assert_eq!(q.params.get("ref").map(String::as_str), Some("email link"));
    }

    #[test]
    fn parse_drops_unknown_mode_and_size() {
        let q = ModalQuery::parse("modal=true&modalMode=archive&modalSize=huge").expect("open");
        assert_eq!(q.mode, None);
        assert_eq!(q.size, None);
    }

    #[test]
    fn apply_replaces_modal_keys_and_keeps_others() {
        let q = ModalQuery {
            entity_tag: Some("user".into()),
            entity_id: Some("3".into()),
            ..ModalQuery::default()
        };
        assert_eq!(
            q.apply_to("page=2&modal=true&modalEntity=store&mp_old=1&sort=name"),
            "page=2&sort=name&modal=true&modalEntity=user&modalId=3"
        );
    }

    #[test]
    fn strip_removes_all_modal_keys() {
        assert_eq!(
            strip("?page=2&modal=true&modalEntity=x&modalId=1&modalTab=a&mp_from=list&sort=name"),
            "page=2&sort=name"
        );
        assert_eq!(strip("modal=true&modalEntity=x"), "");
    }

    #[test]
    fn to_config_restores_routing_fields() {
        let q = ModalQuery::parse("modal=true&modalEntity=store&modalId=9&modalTab=staff&mp_a=b")
            .expect("open");
        let config: ModalConfiguration<JsonBag> = q.to_config();
        assert_eq!(config.entity_tag.as_deref(), Some("store"));
        assert_eq!(config.presentation.active_tab.as_deref(), Some("staff"));
        assert_eq!(ModalQuery::from_config(&config), q);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn text() -> impl Strategy<Value = String> {
            "[a-zA-Z0-9 &=%?#+/_-]{1,12}"
        }

        fn mode() -> impl Strategy<Value = Option<ModalMode>> {
            prop::option::of(prop::sample::select(vec![
                ModalMode::View,
                ModalMode::Edit,
                ModalMode::Create,
                ModalMode::Delete,
                ModalMode::Details,
                ModalMode::Settings,
            ]))
        }

        fn size() -> impl Strategy<Value = Option<ModalSize>> {
            prop::option::of(prop::sample::select(vec![
                ModalSize::Sm,
                ModalSize::Lg,
                ModalSize::Xl,
                ModalSize::Full,
            ]))
        }

        proptest! {
            #[test]
            fn parse_inverts_encode(
                entity_tag in prop::option::of(text()),
                entity_id in prop::option::of(text()),
                mode in mode(),
                tab in prop::option::of(text()),
                size in size(),
                params in prop::collection::btree_map("[a-z]{1,6}", text(), 0..4),
                host in "[a-z]{1,5}=[a-z0-9]{0,5}",
            ) {
                let q = ModalQuery { entity_tag, entity_id, mode, tab, size, params };
                let encoded = q.apply_to(&host);
                prop_assert_eq!(ModalQuery::parse(&encoded), Some(q));
                prop_assert_eq!(strip(&encoded), strip(&host));
            }
        }
    }
}
