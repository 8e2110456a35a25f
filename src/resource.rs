//! Resource capability contract and the two standard resource shapes.

use crate::error::Result;
use crate::types::{ActionName, ConditionName, PrincipalId, ResourceId};

/// Actions every [`ModelResource`] supports.
pub const MODEL_ACTIONS: [&str; 4] = ["create", "read", "update", "delete"];

/// Anything the engine can evaluate access for.
pub trait Resource: Send + Sync {
    /// Canonical hierarchical identifier.
    fn resource_id(&self) -> ResourceId;

    /// Actions the resource supports.
    fn actions(&self) -> Vec<ActionName>;

    /// Action being requested right now, used when the caller passes none.
    fn current_action(&self) -> Option<ActionName> {
        None
    }

    /// Names of the conditions this resource can evaluate.
    fn conditions(&self) -> Vec<ConditionName> {
        Vec::new()
    }

    /// Evaluates a named condition for a principal.
    ///
    /// Unknown conditions must evaluate to `false`.
    fn evaluate_condition(
        &self,
        _principal: Option<&PrincipalId>,
        _condition: &ConditionName,
    ) -> bool {
        false
    }
}

/// A resource type that can be registered without a live instance.
pub trait ResourceType: Resource + Sized {
    /// Builds a placeholder used only to read the identifier, actions and
    /// conditions for the registry.
    fn registry_instance() -> Self;
}

/// A data model record, identified as `m:<model>` or `m:<model>.<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResource {
    id: ResourceId,
    extra_actions: Vec<ActionName>,
}

impl ModelResource {
    /// The model as a whole.
    pub fn model(name: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            id: ResourceId::for_model(name, None)?,
            extra_actions: Vec::new(),
        })
    }

    /// One record of the model.
    pub fn record(name: impl AsRef<str>, key: impl std::fmt::Display) -> Result<Self> {
        Ok(Self {
            id: ResourceId::for_model(name, Some(&key))?,
            extra_actions: Vec::new(),
        })
    }

    /// Adds model specific actions on top of [`MODEL_ACTIONS`].
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = ActionName>) -> Self {
        self.extra_actions.extend(actions);
        self
    }
}

impl Resource for ModelResource {
    fn resource_id(&self) -> ResourceId {
        self.id.clone()
    }

    fn actions(&self) -> Vec<ActionName> {
        let mut actions = self.extra_actions.clone();
        actions.extend(
            MODEL_ACTIONS
                .iter()
                .map(|action| ActionName::from_string((*action).to_string())),
        );
        actions
    }
}

/// A group of request handlers, identified as `c:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerResource {
    id: ResourceId,
    actions: Vec<ActionName>,
    current: Option<ActionName>,
}

impl ControllerResource {
    /// Declares a controller and its actions.
    pub fn new(
        name: impl AsRef<str>,
        actions: impl IntoIterator<Item = ActionName>,
    ) -> Result<Self> {
        Ok(Self {
            id: ResourceId::for_controller(name)?,
            actions: actions.into_iter().collect(),
            current: None,
        })
    }

    /// Marks the action being dispatched.
    pub fn dispatching(mut self, action: ActionName) -> Self {
        self.current = Some(action);
        self
    }
}

impl Resource for ControllerResource {
    fn resource_id(&self) -> ResourceId {
        self.id.clone()
    }

    fn actions(&self) -> Vec<ActionName> {
        self.actions.clone()
    }

    fn current_action(&self) -> Option<ActionName> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_resource_lists_default_and_extra_actions() {
        let resource = ModelResource::record("Order", 42)
            .unwrap()
            .with_actions([ActionName::try_from("ship").unwrap()]);

        assert_eq!(resource.resource_id().as_str(), "m:order.42");
        let actions: Vec<String> = resource
            .actions()
            .into_iter()
            .map(|action| action.to_string())
            .collect();
        assert_eq!(actions, vec!["ship", "create", "read", "update", "delete"]);
        assert!(resource.current_action().is_none());
        assert!(resource.conditions().is_empty());
    }

    #[test]
    fn controller_resource_reports_dispatching_action() {
        let index = ActionName::try_from("index").unwrap();
        let resource = ControllerResource::new("Home", [index.clone()])
            .unwrap()
            .dispatching(index.clone());

        assert_eq!(resource.resource_id().as_str(), "c:home");
        assert_eq!(resource.current_action(), Some(index));
        let condition = ConditionName::try_from("owner").unwrap();
        assert!(!resource.evaluate_condition(None, &condition));
    }
}
