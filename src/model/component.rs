use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prop name -> chosen value. A JSON `null` counts as unset.
pub type ConfiguredProps = BTreeMap<String, serde_json::Value>;

/// Discriminates the action and trigger namespaces of the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    #[default]
    Action,
    Trigger,
}

impl ComponentType {
    /// Collection segment used by the remote API.
    pub fn collection(&self) -> &'static str {
        match self {
            ComponentType::Action => "actions",
            ComponentType::Trigger => "triggers",
        }
    }
}

impl std::str::FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "action" | "actions" => Ok(ComponentType::Action),
            "trigger" | "triggers" => Ok(ComponentType::Trigger),
            other => Err(format!("unknown component type '{}'", other)),
        }
    }
}

/// Catalog listing entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Free-text and app filter for component listings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentFilter {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

/// Full remote action/trigger definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub component_type: ComponentType,
    /// Slug of the app this component authenticates against, if any
    #[serde(default)]
    pub app: Option<String>,
    pub props: Vec<PropDefinition>,
}

impl Component {
    pub fn prop(&self, name: &str) -> Option<&PropDefinition> {
        self.props.iter().find(|p| p.name == name)
    }

    /// App slug taken from the first app-kind prop.
    pub fn app_from_props(props: &[PropDefinition]) -> Option<String> {
        props.iter().find_map(|p| match &p.kind {
            PropKind::App { app } => Some(app.clone()),
            _ => None,
        })
    }
}

/// One configuration field of a component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub kind: PropKind,
    pub required: bool,
    /// Props whose values must be known before this prop's options can be computed
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Static enumerated options, if the definition carries them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<PropOption>>,
    /// Options are computed by the platform from the current configuration
    #[serde(default)]
    pub remote_options: bool,
}

/// Closed set of prop kinds the gateway understands.
///
/// Anything else becomes [`PropKind::Unrecognized`]: it is still listed, but
/// the configurator refuses to resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropKind {
    String,
    StringArray,
    Integer,
    IntegerArray,
    Boolean,
    Object,
    Any,
    App { app: String },
    Timer,
    HttpRequest,
    HttpInterface,
    DataStore,
    Dir,
    Alert,
    Unrecognized { raw: String },
}

impl PropKind {
    /// Map the platform's type string (plus its `app` field for app props).
    pub fn parse(raw: &str, app: Option<&str>) -> Self {
        match raw {
            "string" => PropKind::String,
            "string[]" => PropKind::StringArray,
            "integer" => PropKind::Integer,
            "integer[]" => PropKind::IntegerArray,
            "boolean" => PropKind::Boolean,
            "object" => PropKind::Object,
            "any" => PropKind::Any,
            "app" => match app {
                Some(app) if !app.is_empty() => PropKind::App {
                    app: app.to_string(),
                },
                _ => PropKind::Unrecognized {
                    raw: raw.to_string(),
                },
            },
            "$.interface.timer" => PropKind::Timer,
            "$.interface.http" => PropKind::HttpInterface,
            "http_request" => PropKind::HttpRequest,
            "data_store" | "$.service.db" => PropKind::DataStore,
            "dir" => PropKind::Dir,
            "alert" => PropKind::Alert,
            other => PropKind::Unrecognized {
                raw: other.to_string(),
            },
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, PropKind::Unrecognized { .. })
    }
}

/// One selectable value for a prop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropOption {
    pub label: String,
    pub value: serde_json::Value,
}

impl PropOption {
    /// Options sent as bare values use their own text as label.
    pub fn from_value(value: serde_json::Value) -> Self {
        let label = match &value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self { label, value }
    }
}
