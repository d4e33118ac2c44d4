#![forbid(unsafe_code)]

//! Modal configuration: the unit of state for one modal instance.
//!
//! A [`ModalConfiguration`] carries three kinds of fields:
//!
//! - **Identity and routing** (`id`, `entity_tag`, `entity_id`, `mode`,
//!   `params`): what the content is, mirrored into the address bar.
//! - **Structure** (`parent_id`, `children`, `steps`, `current_step`,
//!   `steps_validation`): owned by the store and the wizard engine.
//! - **Opaque payload** (`data`, `presentation`, `callbacks`): preserved and
//!   compared, never interpreted by the core.
//!
//! Hook fields hold `Rc` closures. Two configurations are equal only when
//! their hooks are the *same* closures (pointer identity), so re-inserting an
//! unchanged configuration never triggers a notification.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::str::FromStr;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::data::JsonBag;
use crate::id::ModalId;

/// Async yes/no gate (step validation, before-next/before-back guards).
pub type GuardFn = Rc<dyn Fn() -> LocalBoxFuture<'static, bool>>;
/// Async side-effect hook run during a step transition.
pub type HookFn = Rc<dyn Fn() -> LocalBoxFuture<'static, ()>>;
/// Terminal wizard hook; receives the modal's data at completion.
pub type CompleteFn<D> = Rc<dyn Fn(D) -> LocalBoxFuture<'static, ()>>;
/// Synchronous presentation callback (confirm, cancel, close buttons).
pub type ActionFn = Rc<dyn Fn()>;

fn same_rc<T: ?Sized>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
        _ => false,
    }
}

fn guard_fn<F, Fut>(f: F) -> GuardFn
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = bool> + 'static,
{
    Rc::new(move || f().boxed_local())
}

fn hook_fn<F, Fut>(f: F) -> HookFn
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    Rc::new(move || f().boxed_local())
}

/// What the modal does with its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalMode {
    View,
    Edit,
    Create,
    Delete,
    Details,
    Settings,
}

impl ModalMode {
    /// Wire form used in the address bar.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Details => "details",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for ModalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized mode or size string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown modal {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for ModalMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "view" => Self::View,
            "edit" => Self::Edit,
            "create" => Self::Create,
            "delete" => Self::Delete,
            "details" => Self::Details,
            "settings" => Self::Settings,
            _ => {
                return Err(UnknownVariant {
                    kind: "mode",
                    value: s.to_owned(),
                });
            }
        })
    }
}

/// Modal width preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalSize {
    Sm,
    #[default]
    Md,
    Lg,
    Xl,
    Full,
}

impl ModalSize {
    /// Wire form used in the address bar.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sm => "sm",
            Self::Md => "md",
            Self::Lg => "lg",
            Self::Xl => "xl",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ModalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModalSize {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "sm" => Self::Sm,
            "md" => Self::Md,
            "lg" => Self::Lg,
            "xl" => Self::Xl,
            "full" => Self::Full,
            _ => {
                return Err(UnknownVariant {
                    kind: "size",
                    value: s.to_owned(),
                });
            }
        })
    }
}

/// Presentation settings consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub title: Option<String>,
    pub description: Option<String>,
    pub size: ModalSize,
    /// Tab ids, in display order. Empty for untabbed modals.
    pub tabs: Vec<String>,
    pub active_tab: Option<String>,
    pub confirm_label: Option<String>,
    pub cancel_label: Option<String>,
    pub show_close_button: bool,
    pub close_on_backdrop: bool,
    pub close_on_escape: bool,
    /// Inline content that overrides the registry lookup.
    pub content: Option<String>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            size: ModalSize::Md,
            tabs: Vec::new(),
            active_tab: None,
            confirm_label: None,
            cancel_label: None,
            show_close_button: true,
            close_on_backdrop: true,
            close_on_escape: true,
            content: None,
        }
    }
}

/// Button callbacks. The core stores them; only the renderer calls them.
#[derive(Clone, Default)]
pub struct ModalCallbacks {
    pub on_confirm: Option<ActionFn>,
    pub on_cancel: Option<ActionFn>,
    pub on_close: Option<ActionFn>,
}

impl PartialEq for ModalCallbacks {
    fn eq(&self, other: &Self) -> bool {
        same_rc(&self.on_confirm, &other.on_confirm)
            && same_rc(&self.on_cancel, &other.on_cancel)
            && same_rc(&self.on_close, &other.on_close)
    }
}

impl fmt::Debug for ModalCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalCallbacks")
            .field("on_confirm", &self.on_confirm.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// One step of a wizard.
#[derive(Clone)]
pub struct ModalStep {
    pub id: String,
    pub label: String,
    pub validate: Option<GuardFn>,
    pub on_next: Option<HookFn>,
    pub on_back: Option<HookFn>,
}

impl ModalStep {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            validate: None,
            on_next: None,
            on_back: None,
        }
    }

    /// Gate forward movement on an async check.
    #[must_use]
    pub fn validate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.validate = Some(guard_fn(f));
        self
    }

    /// Gate forward movement on a synchronous check.
    #[must_use]
    pub fn validate_with(mut self, f: impl Fn() -> bool + 'static) -> Self {
        self.validate = Some(Rc::new(move || futures::future::ready(f()).boxed_local()));
        self
    }

    #[must_use]
    pub fn on_next<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.on_next = Some(hook_fn(f));
        self
    }

    #[must_use]
    pub fn on_back<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.on_back = Some(hook_fn(f));
        self
    }
}

impl PartialEq for ModalStep {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.label == other.label
            && same_rc(&self.validate, &other.validate)
            && same_rc(&self.on_next, &other.on_next)
            && same_rc(&self.on_back, &other.on_back)
    }
}

impl fmt::Debug for ModalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalStep")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("validate", &self.validate.is_some())
            .field("on_next", &self.on_next.is_some())
            .field("on_back", &self.on_back.is_some())
            .finish()
    }
}

/// Modal-wide wizard hooks.
pub struct WizardHooks<D> {
    pub before_next: Option<GuardFn>,
    pub before_back: Option<GuardFn>,
    pub on_complete: Option<CompleteFn<D>>,
}

impl<D> Default for WizardHooks<D> {
    fn default() -> Self {
        Self {
            before_next: None,
            before_back: None,
            on_complete: None,
        }
    }
}

impl<D> Clone for WizardHooks<D> {
    fn clone(&self) -> Self {
        Self {
            before_next: self.before_next.clone(),
            before_back: self.before_back.clone(),
            on_complete: self.on_complete.clone(),
        }
    }
}

impl<D> PartialEq for WizardHooks<D> {
    fn eq(&self, other: &Self) -> bool {
        same_rc(&self.before_next, &other.before_next)
            && same_rc(&self.before_back, &other.before_back)
            && same_rc(&self.on_complete, &other.on_complete)
    }
}

impl<D> fmt::Debug for WizardHooks<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardHooks")
            .field("before_next", &self.before_next.is_some())
            .field("before_back", &self.before_back.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Configuration for one modal instance.
///
/// `id` is `None` until the store inserts the configuration, and always
/// `Some` afterwards.
#[derive(Clone, PartialEq, Debug)]
pub struct ModalConfiguration<D = JsonBag> {
    pub id: Option<ModalId>,
    pub entity_tag: Option<String>,
    pub entity_id: Option<String>,
    pub mode: Option<ModalMode>,
    pub parent_id: Option<ModalId>,
    pub children: Vec<ModalId>,
    pub data: D,
    pub steps: Vec<ModalStep>,
    pub current_step: usize,
    pub steps_validation: BTreeMap<String, bool>,
    pub presentation: Presentation,
    pub hooks: WizardHooks<D>,
    pub callbacks: ModalCallbacks,
    /// Extension parameters, mirrored as `mp_<name>` in the address bar.
    pub params: BTreeMap<String, String>,
}

impl<D: Default> Default for ModalConfiguration<D> {
    fn default() -> Self {
        Self::new(D::default())
    }
}

impl<D> ModalConfiguration<D> {
    /// A bare configuration around `data`.
    #[must_use]
    pub fn new(data: D) -> Self {
        Self {
            id: None,
            entity_tag: None,
            entity_id: None,
            mode: None,
            parent_id: None,
            children: Vec::new(),
            data,
            steps: Vec::new(),
            current_step: 0,
            steps_validation: BTreeMap::new(),
            presentation: Presentation::default(),
            hooks: WizardHooks::default(),
            callbacks: ModalCallbacks::default(),
            params: BTreeMap::new(),
        }
    }

    /// A configuration that renders entity `entity_id` of kind `tag`.
    #[must_use]
    pub fn entity(tag: impl Into<String>, entity_id: impl Into<String>) -> Self
    where
        D: Default,
    {
        let mut config = Self::default();
        config.entity_tag = Some(tag.into());
        config.entity_id = Some(entity_id.into());
        config
    }

    /// The store-assigned id. `None` only before insertion.
    #[must_use]
    pub fn id(&self) -> Option<ModalId> {
        self.id
    }

    #[must_use]
    pub fn with_id(mut self, id: ModalId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_entity_tag(mut self, tag: impl Into<String>) -> Self {
        self.entity_tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ModalMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: D) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.presentation.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: ModalSize) -> Self {
        self.presentation.size = size;
        self
    }

    /// Declare the tab set; the first tab becomes active if none is.
    #[must_use]
    pub fn with_tabs<I, S>(mut self, tabs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presentation.tabs = tabs.into_iter().map(Into::into).collect();
        if self.presentation.active_tab.is_none() {
            self.presentation.active_tab = self.presentation.tabs.first().cloned();
        }
        self
    }

    #[must_use]
    pub fn with_active_tab(mut self, tab: impl Into<String>) -> Self {
        self.presentation.active_tab = Some(tab.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.presentation.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_step(mut self, step: ModalStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = ModalStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    #[must_use]
    pub fn before_next<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.hooks.before_next = Some(guard_fn(f));
        self
    }

    #[must_use]
    pub fn before_back<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.hooks.before_back = Some(guard_fn(f));
        self
    }

    #[must_use]
    pub fn on_complete<F, Fut>(mut self, f: F) -> Self
    where
        D: 'static,
        F: Fn(D) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.hooks.on_complete = Some(Rc::new(move |data| f(data).boxed_local()));
        self
    }

    #[must_use]
    pub fn on_close(mut self, f: impl Fn() + 'static) -> Self {
        self.callbacks.on_close = Some(Rc::new(f));
        self
    }

    /// Step at the current index, if the modal has steps.
    #[must_use]
    pub fn current(&self) -> Option<&ModalStep> {
        self.steps.get(self.current_step)
    }

    /// Whether the current step is the final one.
    #[must_use]
    pub fn is_last_step(&self) -> bool {
        self.steps.is_empty() || self.current_step + 1 >= self.steps.len()
    }

    /// Keep `current_step` inside the step range.
    pub(crate) fn clamp_current_step(&mut self) {
        self.current_step = match self.steps.len() {
            0 => 0,
            len => self.current_step.min(len - 1),
        };
    }
}

/// Shallow update for the routing and presentation fields of a modal.
///
/// `None` leaves a field alone. `params` entries are merged key by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub entity_tag: Option<String>,
    pub entity_id: Option<String>,
    pub mode: Option<ModalMode>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub size: Option<ModalSize>,
    pub active_tab: Option<String>,
    pub confirm_label: Option<String>,
    pub cancel_label: Option<String>,
    pub content: Option<String>,
    pub params: BTreeMap<String, String>,
    pub steps: Option<Vec<ModalStep>>,
}

impl ConfigPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(mut self, mode: ModalMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn size(mut self, size: ModalSize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn active_tab(mut self, tab: impl Into<String>) -> Self {
        self.active_tab = Some(tab.into());
        self
    }

    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn steps(mut self, steps: Vec<ModalStep>) -> Self {
        self.steps = Some(steps);
        self
    }

    pub(crate) fn apply<D>(self, config: &mut ModalConfiguration<D>) {
        let p = &mut config.presentation;
        if let Some(v) = self.entity_tag {
            config.entity_tag = Some(v);
        }
        if let Some(v) = self.entity_id {
            config.entity_id = Some(v);
        }
        if let Some(v) = self.mode {
            config.mode = Some(v);
        }
        if let Some(v) = self.title {
            p.title = Some(v);
        }
        if let Some(v) = self.description {
            p.description = Some(v);
        }
        if let Some(v) = self.size {
            p.size = v;
        }
        if let Some(v) = self.active_tab {
            p.active_tab = Some(v);
        }
        if let Some(v) = self.confirm_label {
            p.confirm_label = Some(v);
        }
        if let Some(v) = self.cancel_label {
            p.cancel_label = Some(v);
        }
        if let Some(v) = self.content {
            p.content = Some(v);
        }
        config.params.extend(self.params);
        if let Some(steps) = self.steps {
            config.steps = steps;
            config.clamp_current_step();
        }
    }
}
