//! Named operations the assistant can invoke, with their parameter schemas.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::area;
use crate::error::ActionError;
use crate::render;
use crate::store::{Session, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ParamType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Enabled,
    /// Only the assistant dispatcher may call it; hidden from the user.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Changes session state, nothing to display.
    Handler,
    /// Produces something to display.
    Render,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterSpec],
    pub available: Availability,
    pub kind: ActionKind,
}

pub const GREET_USER: &str = "greet_user";
pub const SET_BACKGROUND_COLOR: &str = "setBackgroundColor";
pub const FLY_TO_LOCATION: &str = "flyToLocation";
pub const VALIDATE_FEATURE: &str = "validateFeature";

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: GREET_USER,
        description: "Greet the user by name.",
        parameters: &[ParameterSpec {
            name: "name",
            description: "The name of the user to greet.",
            kind: None,
        }],
        available: Availability::Disabled,
        kind: ActionKind::Render,
    },
    ActionSpec {
        name: SET_BACKGROUND_COLOR,
        description: "Set the page background color.",
        parameters: &[ParameterSpec {
            name: "backgroundColor",
            description: "The background color to set. Make sure to pick nice colors.",
            kind: None,
        }],
        available: Availability::Enabled,
        kind: ActionKind::Handler,
    },
    ActionSpec {
        name: FLY_TO_LOCATION,
        description: "Move the map camera to a location.",
        parameters: &[
            ParameterSpec {
                name: "longitude",
                description: "The longitude of the location to fly to.",
                kind: Some(ParamType::Number),
            },
            ParameterSpec {
                name: "latitude",
                description: "The latitude of the location to fly to.",
                kind: Some(ParamType::Number),
            },
        ],
        available: Availability::Enabled,
        kind: ActionKind::Handler,
    },
    ActionSpec {
        name: VALIDATE_FEATURE,
        description: "Report the total area of the drawn polygons.",
        parameters: &[],
        available: Availability::Enabled,
        kind: ActionKind::Render,
    },
];

pub fn find(name: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|spec| spec.name == name)
}

/// Actions listed to the user. Disabled ones stay reachable for the
/// assistant dispatcher.
pub fn user_facing() -> impl Iterator<Item = &'static ActionSpec> {
    ACTIONS
        .iter()
        .filter(|spec| spec.available == Availability::Enabled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Invoker {
    #[default]
    User,
    Assistant,
}

/// Lifecycle stage reported by the dispatcher alongside render calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionStatus {
    InProgress,
    Executing,
    #[default]
    Complete,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::InProgress => "inProgress",
            ActionStatus::Executing => "executing",
            ActionStatus::Complete => "complete",
        }
    }
}

/// A call as it arrives from the dispatcher.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionRequest {
    pub args: Value,
    pub invoker: Invoker,
    pub status: ActionStatus,
    pub result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    GreetUser { name: Option<String> },
    SetBackgroundColor { color: String },
    FlyToLocation { longitude: f64, latitude: f64 },
    ValidateFeature,
}

#[derive(Deserialize)]
struct GreetArgs {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackgroundArgs {
    background_color: String,
}

#[derive(Deserialize)]
struct FlyToArgs {
    longitude: f64,
    latitude: f64,
}

impl Action {
    pub fn parse(name: &str, args: &Value) -> Result<Self, ActionError> {
        let action = match name {
            GREET_USER => {
                let args: GreetArgs = decode(name, args)?;
                Action::GreetUser { name: args.name }
            }
            SET_BACKGROUND_COLOR => {
                let args: BackgroundArgs = decode(name, args)?;
                Action::SetBackgroundColor {
                    color: args.background_color,
                }
            }
            FLY_TO_LOCATION => {
                let args: FlyToArgs = decode(name, args)?;
                Action::FlyToLocation {
                    longitude: args.longitude,
                    latitude: args.latitude,
                }
            }
            VALIDATE_FEATURE => Action::ValidateFeature,
            other => return Err(ActionError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

fn decode<T: DeserializeOwned>(action: &str, args: &Value) -> Result<T, ActionError> {
    // A call without arguments arrives as `null`.
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|source| ActionError::InvalidArguments {
        action: action.to_string(),
        source,
    })
}

/// What an invocation produced: a machine-readable result and, for render
/// actions, the display markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub action: &'static str,
    pub status: ActionStatus,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

pub fn dispatch(
    session: &mut Session,
    name: &str,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let spec = find(name).ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
    if spec.available == Availability::Disabled && request.invoker == Invoker::User {
        return Err(ActionError::NotAvailable(name.to_string()));
    }

    let action = Action::parse(name, &request.args)?;
    info!("Dispatching {} for {:?}", spec.name, request.invoker);

    let (result, rendered) = match action {
        Action::GreetUser { .. } => {
            let rendered =
                render::greet_table(spec.name, &request.args, request.result.as_ref(), request.status);
            (request.result.clone().unwrap_or(Value::Null), Some(rendered))
        }
        Action::SetBackgroundColor { color } => {
            session.apply(SessionEvent::SetBackgroundColor(color));
            (Value::Null, None)
        }
        Action::FlyToLocation {
            longitude,
            latitude,
        } => {
            session.apply(SessionEvent::FlyTo {
                longitude,
                latitude,
            });
            let flight = session.map.last_flight().filter(|f| f.center == [longitude, latitude]);
            (json!(flight), None)
        }
        Action::ValidateFeature => {
            let report = area::aggregate(&session.features.snapshot());
            let rendered = render::area_report(&report);
            (json!(report), Some(rendered))
        }
    };

    Ok(ActionResponse {
        action: spec.name,
        status: request.status,
        result,
        rendered,
    })
}
