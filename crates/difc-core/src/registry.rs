//! Named-tag registry: the principal-facing layer above the raw monitor.
//!
//! The monitor deals in opaque tag values and pids. Embedding hosts deal in
//! human-readable tag names owned by principals (application identities).
//! The registry bridges the two: it allocates unique values for named tags,
//! tracks which principals hold which named capabilities, seeds new
//! processes with their principal's capabilities, and answers the
//! relabel/export policy questions that only make sense at the name level.
//!
//! All registry bookkeeping sits behind one mutex; tag creation and policy
//! checks are rare compared to monitor traffic, so a single lock is fine
//! here. Monitor calls are made while holding it, which keeps the
//! name-level check and the value-level mutation of one request atomic with
//! respect to other registry callers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::ProcessSecurityContext;
use crate::error::RegistryError;
use crate::label::SecurityLabel;
use crate::monitor::ReferenceMonitor;
use crate::tag::{CapabilityEdit, Pid, Polarity, Tag, Uid};

/// An application identity that owns tags and holds named capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    /// Constructs a principal from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options supplied at tag creation.
#[derive(Debug, Clone, Default)]
pub struct TagOptions {
    /// Grant every process the right to add this tag.
    pub global_positive: bool,
    /// Grant every process the right to remove this tag.
    pub global_negative: bool,
    /// Principals pre-granted the positive capability. They need not be
    /// known to the registry yet.
    pub positive_grants: Vec<Principal>,
    /// Principals pre-granted the negative capability.
    pub negative_grants: Vec<Principal>,
    /// Network domains this tag's data may be exported to.
    pub domains: Vec<String>,
}

/// Outcome of an export-policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDecision {
    /// Every tag on the label is bound to the destination domain.
    Allow,
    /// At least one tag is unknown or not bound to the destination.
    Deny,
}

impl ExportDecision {
    /// Returns true for [`ExportDecision::Allow`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Every tag value ever allocated, for collision-free allocation.
    values: HashSet<Tag>,
    /// Absolute name (`owner:name`) to value.
    names: HashMap<String, Tag>,
    /// Value back to absolute name.
    names_by_value: HashMap<Tag, String>,
    /// Named positive capabilities per principal.
    positive: HashMap<Principal, HashSet<String>>,
    /// Named negative capabilities per principal.
    negative: HashMap<Principal, HashSet<String>>,
    /// Names granted globally.
    global_positive: HashSet<String>,
    global_negative: HashSet<String>,
    /// Export policy: domains each tag's data may flow to.
    domains: HashMap<Tag, HashSet<String>>,
}

impl RegistryState {
    fn principal_has(&self, principal: &Principal, name: &str, polarity: Polarity) -> bool {
        let (global, map) = match polarity {
            Polarity::Positive => (&self.global_positive, &self.positive),
            Polarity::Negative => (&self.global_negative, &self.negative),
        };
        global.contains(name)
            || map
                .get(principal)
                .is_some_and(|caps| caps.contains(name))
    }

    fn grant(&mut self, principal: Principal, name: String, polarity: Polarity) {
        let map = match polarity {
            Polarity::Positive => &mut self.positive,
            Polarity::Negative => &mut self.negative,
        };
        map.entry(principal).or_default().insert(name);
    }
}

/// The named-tag registry. Wraps a shared [`ReferenceMonitor`].
#[derive(Debug)]
pub struct TagRegistry {
    monitor: Arc<ReferenceMonitor>,
    state: Mutex<RegistryState>,
}

impl TagRegistry {
    /// Creates an empty registry over the given monitor.
    #[must_use]
    pub fn new(monitor: Arc<ReferenceMonitor>) -> Self {
        Self {
            monitor,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// The monitor this registry feeds.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ReferenceMonitor> {
        &self.monitor
    }

    /// The absolute form of a tag name: `owner:name`.
    #[must_use]
    pub fn absolute_name(owner: &Principal, name: &str) -> String {
        format!("{owner}:{name}")
    }

    /// Creates a named tag owned by `owner`.
    ///
    /// Allocates a fresh random value (retrying on collision), gives the
    /// owner both named capabilities plus the matching process capabilities
    /// for `owner_pid`, and applies the requested global grants,
    /// pre-assigned grants, and domain bindings. Creating a name that
    /// already exists is a no-op returning the existing value.
    pub fn create_tag(
        &self,
        owner: &Principal,
        name: &str,
        owner_pid: Pid,
        opts: TagOptions,
    ) -> Tag {
        let absolute = Self::absolute_name(owner, name);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = state.names.get(&absolute) {
            return *existing;
        }

        let mut rng = rand::thread_rng();
        let mut tag = Tag(rng.gen());
        while state.values.contains(&tag) {
            tag = Tag(rng.gen());
        }
        state.values.insert(tag);
        state.names.insert(absolute.clone(), tag);
        state.names_by_value.insert(tag, absolute.clone());

        // The owner holds both rights, by name and for its live process.
        state.grant(owner.clone(), absolute.clone(), Polarity::Positive);
        state.grant(owner.clone(), absolute.clone(), Polarity::Negative);
        self.monitor
            .edit_process_capability(owner_pid, tag, Polarity::Positive, CapabilityEdit::Grant);
        self.monitor
            .edit_process_capability(owner_pid, tag, Polarity::Negative, CapabilityEdit::Grant);

        if opts.global_positive {
            state.global_positive.insert(absolute.clone());
            self.monitor
                .edit_global_capability(tag, Polarity::Positive, CapabilityEdit::Grant);
        }
        if opts.global_negative {
            state.global_negative.insert(absolute.clone());
            self.monitor
                .edit_global_capability(tag, Polarity::Negative, CapabilityEdit::Grant);
        }
        for principal in opts.positive_grants {
            state.grant(principal, absolute.clone(), Polarity::Positive);
        }
        for principal in opts.negative_grants {
            state.grant(principal, absolute.clone(), Polarity::Negative);
        }
        if !opts.domains.is_empty() {
            state
                .domains
                .insert(tag, opts.domains.into_iter().collect());
        }

        info!(owner = %owner, name = %absolute, %tag, "created tag");
        tag
    }

    /// Resolves an absolute tag name to its value.
    #[must_use]
    pub fn resolve(&self, absolute_name: &str) -> Option<Tag> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .names
            .get(absolute_name)
            .copied()
    }

    /// Whether `principal` may add the named tag to a label. False for
    /// unknown names.
    #[must_use]
    pub fn check_add(&self, absolute_name: &str, principal: &Principal) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.names.contains_key(absolute_name)
            && state.principal_has(principal, absolute_name, Polarity::Positive)
    }

    /// Adds the named tag to `pid`'s label on behalf of `principal`.
    ///
    /// The name-level check and the monitor's value-level gate both apply;
    /// the monitor gate holds for processes whose value-level capabilities
    /// were seeded from a different principal's grants.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownTag`] for unresolved names,
    /// [`RegistryError::AddDenied`] when the principal lacks the named
    /// capability, or the monitor's own denial passed through.
    pub fn add_tag_to_label(
        &self,
        absolute_name: &str,
        principal: &Principal,
        pid: Pid,
    ) -> Result<(), RegistryError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let tag = *state
            .names
            .get(absolute_name)
            .ok_or_else(|| RegistryError::UnknownTag {
                name: absolute_name.to_owned(),
            })?;
        if !state.principal_has(principal, absolute_name, Polarity::Positive) {
            return Err(RegistryError::AddDenied {
                principal: principal.to_string(),
                name: absolute_name.to_owned(),
            });
        }
        debug!(%principal, name = %absolute_name, %tag, %pid, "adding named tag to label");
        self.monitor.add_tag_to_label(pid, tag)?;
        Ok(())
    }

    /// The tag values a new process of `principal` starts out holding, as
    /// `(positive, negative)` lists. Names granted before their tag was
    /// created resolve to nothing and are skipped.
    #[must_use]
    pub fn process_capabilities(&self, principal: &Principal) -> (Vec<Tag>, Vec<Tag>) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let resolve_all = |names: Option<&HashSet<String>>| -> Vec<Tag> {
            names
                .into_iter()
                .flatten()
                .filter_map(|n| state.names.get(n).copied())
                .collect()
        };
        (
            resolve_all(state.positive.get(principal)),
            resolve_all(state.negative.get(principal)),
        )
    }

    /// Builds the full security context for a new process of `principal`:
    /// the supplied initial label plus the principal's capability grants.
    #[must_use]
    pub fn initial_context(
        &self,
        pid: Pid,
        uid: Uid,
        principal: &Principal,
        label: &SecurityLabel,
    ) -> ProcessSecurityContext {
        let (pos, neg) = self.process_capabilities(principal);
        ProcessSecurityContext {
            pid,
            uid,
            sec: label.to_vec(),
            pos,
            neg,
        }
    }

    /// Checks whether `principal` may change a label from `current` to the
    /// label named by `proposed`: every tag leaving needs the negative
    /// capability, every tag entering the positive one.
    ///
    /// Returns the label the caller is allowed to end up with — `proposed`
    /// resolved to values when every check passes, otherwise `current`
    /// unchanged. Unresolvable tags on either side fail the check.
    #[must_use]
    pub fn check_relabel(
        &self,
        principal: &Principal,
        current: &SecurityLabel,
        proposed: &HashSet<String>,
    ) -> SecurityLabel {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mut current_names = HashSet::with_capacity(current.len());
        for tag in current.iter() {
            match state.names_by_value.get(&tag) {
                Some(name) => {
                    current_names.insert(name.clone());
                }
                // A label tag the registry has never heard of cannot be
                // reasoned about; keep the label as is.
                None => return current.clone(),
            }
        }

        for name in &current_names {
            if !proposed.contains(name)
                && !state.principal_has(principal, name, Polarity::Negative)
            {
                debug!(%principal, name = %name, "relabel denied: missing negative capability");
                return current.clone();
            }
        }
        for name in proposed {
            if !current_names.contains(name)
                && !state.principal_has(principal, name, Polarity::Positive)
            {
                debug!(%principal, name = %name, "relabel denied: missing positive capability");
                return current.clone();
            }
        }

        let mut result = SecurityLabel::new();
        for name in proposed {
            match state.names.get(name) {
                Some(tag) => result.insert(*tag),
                None => return current.clone(),
            }
        }
        result
    }

    /// Export policy: may data carrying `label` flow to network `host`?
    ///
    /// Allowed only when every tag on the label is bound to that domain.
    /// Unknown tags and unbound domains deny; the empty label always
    /// passes. Fail-closed on every malformed input.
    #[must_use]
    pub fn check_export(&self, label: &SecurityLabel, host: &str) -> ExportDecision {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for tag in label.iter() {
            let allowed = state
                .domains
                .get(&tag)
                .is_some_and(|domains| domains.contains(host));
            if !allowed {
                debug!(%tag, host, "export denied");
                return ExportDecision::Deny;
            }
        }
        ExportDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TagRegistry {
        TagRegistry::new(Arc::new(ReferenceMonitor::new()))
    }

    fn owner() -> Principal {
        Principal::new("com.example.owner")
    }

    #[test]
    fn create_tag_grants_owner_both_polarities() {
        let registry = registry();
        let tag = registry.create_tag(&owner(), "photos", Pid(50), TagOptions::default());
        let name = TagRegistry::absolute_name(&owner(), "photos");
        assert_eq!(registry.resolve(&name), Some(tag));
        assert!(registry.check_add(&name, &owner()));
        // The owning process got value-level capabilities too.
        registry.monitor().add_tag_to_label(Pid(50), tag).unwrap();
        registry
            .monitor()
            .remove_tag_from_label(Pid(50), tag)
            .unwrap();
    }

    #[test]
    fn create_existing_name_is_noop_returning_same_value() {
        let registry = registry();
        let first = registry.create_tag(&owner(), "photos", Pid(50), TagOptions::default());
        let second = registry.create_tag(&owner(), "photos", Pid(51), TagOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn check_add_false_for_unknown_name_and_stranger() {
        let registry = registry();
        registry.create_tag(&owner(), "photos", Pid(50), TagOptions::default());
        let name = TagRegistry::absolute_name(&owner(), "photos");
        assert!(!registry.check_add("com.example.owner:missing", &owner()));
        assert!(!registry.check_add(&name, &Principal::new("com.example.stranger")));
    }

    #[test]
    fn global_positive_lets_any_principal_add() {
        let registry = registry();
        let tag = registry.create_tag(
            &owner(),
            "public",
            Pid(50),
            TagOptions {
                global_positive: true,
                ..TagOptions::default()
            },
        );
        let name = TagRegistry::absolute_name(&owner(), "public");
        let stranger = Principal::new("com.example.stranger");
        assert!(registry.check_add(&name, &stranger));
        // The monitor-side global grant lets an unseeded process be tainted.
        registry
            .add_tag_to_label(&name, &stranger, Pid(77))
            .unwrap();
        assert!(registry.monitor().process_label(Pid(77)).contains(tag));
    }

    #[test]
    fn pre_granted_principal_can_add_after_its_process_is_seeded() {
        let registry = registry();
        let reader = Principal::new("com.example.reader");
        let tag = registry.create_tag(
            &owner(),
            "photos",
            Pid(50),
            TagOptions {
                positive_grants: vec![reader.clone()],
                ..TagOptions::default()
            },
        );
        let name = TagRegistry::absolute_name(&owner(), "photos");
        assert!(registry.check_add(&name, &reader));

        // Seed a reader process from its principal grants, then taint it.
        let ctx = registry.initial_context(
            Pid(60),
            Uid(1000),
            &reader,
            &SecurityLabel::new(),
        );
        assert_eq!(ctx.pos, vec![tag]);
        assert!(ctx.neg.is_empty());
        registry.monitor().init_process_context(ctx).unwrap();
        registry.add_tag_to_label(&name, &reader, Pid(60)).unwrap();
        assert!(registry.monitor().process_label(Pid(60)).contains(tag));
    }

    #[test]
    fn add_denied_for_principal_without_named_capability() {
        let registry = registry();
        registry.create_tag(&owner(), "photos", Pid(50), TagOptions::default());
        let name = TagRegistry::absolute_name(&owner(), "photos");
        let err = registry
            .add_tag_to_label(&name, &Principal::new("com.example.stranger"), Pid(60))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AddDenied { .. }));
        assert!(registry.monitor().process_label(Pid(60)).is_empty());
    }

    #[test]
    fn add_unknown_name_fails() {
        let registry = registry();
        let err = registry
            .add_tag_to_label("nobody:nothing", &owner(), Pid(60))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTag { .. }));
    }

    #[test]
    fn relabel_requires_negative_to_drop_and_positive_to_gain() {
        let registry = registry();
        let o = owner();
        let gainer = Principal::new("com.example.gainer");
        let held = registry.create_tag(&o, "held", Pid(50), TagOptions::default());
        let wanted = registry.create_tag(
            &o,
            "wanted",
            Pid(50),
            TagOptions {
                positive_grants: vec![gainer.clone()],
                ..TagOptions::default()
            },
        );
        let wanted_name = TagRegistry::absolute_name(&o, "wanted");

        let current: SecurityLabel = [held].into_iter().collect();
        let proposed: HashSet<String> = [wanted_name.clone()].into_iter().collect();

        // The owner holds both capabilities for both tags: allowed.
        let result = registry.check_relabel(&o, &current, &proposed);
        assert_eq!(result, [wanted].into_iter().collect());

        // A stranger can neither drop `held` nor gain `wanted`.
        let stranger = Principal::new("com.example.stranger");
        let result = registry.check_relabel(&stranger, &current, &proposed);
        assert_eq!(result, current);

        // With only the positive grant for `wanted`, dropping `held` still
        // fails.
        let result = registry.check_relabel(&gainer, &current, &proposed);
        assert_eq!(result, current);
    }

    #[test]
    fn relabel_with_unknown_value_keeps_current() {
        let registry = registry();
        let current: SecurityLabel = [Tag(12345)].into_iter().collect();
        let result = registry.check_relabel(&owner(), &current, &HashSet::new());
        assert_eq!(result, current);
    }

    #[test]
    fn export_allowed_only_when_every_tag_is_bound_to_host() {
        let registry = registry();
        let bound = registry.create_tag(
            &owner(),
            "bound",
            Pid(50),
            TagOptions {
                domains: vec!["example.com".to_owned()],
                ..TagOptions::default()
            },
        );
        let unbound = registry.create_tag(&owner(), "unbound", Pid(50), TagOptions::default());

        let label: SecurityLabel = [bound].into_iter().collect();
        assert!(registry.check_export(&label, "example.com").is_allowed());
        assert!(!registry.check_export(&label, "other.com").is_allowed());

        let label: SecurityLabel = [bound, unbound].into_iter().collect();
        assert!(!registry.check_export(&label, "example.com").is_allowed());

        // Unknown tag values deny; the empty label passes.
        let label: SecurityLabel = [Tag(424_242)].into_iter().collect();
        assert!(!registry.check_export(&label, "example.com").is_allowed());
        assert!(registry
            .check_export(&SecurityLabel::new(), "example.com")
            .is_allowed());
    }
}
