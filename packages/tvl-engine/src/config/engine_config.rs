//! Fixpoint engine configuration
//!
//! One flat struct, every field defaulted so partial YAML files work.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;

/// Which locations keep their merged structures between visits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveLocations {
    /// Join points, loop headers and reported locations
    JoinPoints,
    /// Loop headers and reported locations
    Back,
    /// Join points and reported locations
    Ext,
    /// Every location
    All,
}

impl Default for SaveLocations {
    fn default() -> Self {
        Self::JoinPoints
    }
}

impl SaveLocations {
    /// Persistence decision for one location
    pub fn should_join(
        &self,
        incoming: usize,
        has_back_edge: bool,
        reported: bool,
    ) -> bool {
        match self {
            Self::JoinPoints => incoming > 1 || has_back_edge || reported,
            Self::Back => has_back_edge || reported,
            Self::Ext => incoming > 1 || reported,
            Self::All => true,
        }
    }
}

/// Worklist comparator over DFS post-order numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorklistOrder {
    /// Highest post-order first (entry side of the graph first)
    ReversePostOrder,
    /// Lowest post-order first
    PostOrder,
}

impl Default for WorklistOrder {
    fn default() -> Self {
        Self::ReversePostOrder
    }
}

/// Transformer steps enabled by the action-order string
///
/// Grammar: `[f][c]pu[c][b]`. `p` and `u` are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOrder {
    pub focus: bool,
    pub coerce_after_focus: bool,
    pub coerce_after_update: bool,
    pub blur: bool,
}

impl Default for ActionOrder {
    fn default() -> Self {
        Self {
            focus: true,
            coerce_after_focus: true,
            coerce_after_update: true,
            blur: true,
        }
    }
}

impl ActionOrder {
    /// Parse an order string such as `"fpucb"` or `"pu"`
    pub fn parse(order: &str) -> ConfigResult<Self> {
        let hint = "Expected [f][c]pu[c][b], e.g. 'fcpucb' or 'pu'.";
        let mut chars = order.chars().peekable();
        let mut next_if = |expected: char| chars.next_if_eq(&expected).is_some();

        let focus = next_if('f');
        let coerce_after_focus = next_if('c');
        if !next_if('p') {
            return Err(ConfigError::invalid_action_order(
                order,
                format!("Missing precondition step 'p'. {hint}"),
            ));
        }
        if !next_if('u') {
            return Err(ConfigError::invalid_action_order(
                order,
                format!("Missing update step 'u' after 'p'. {hint}"),
            ));
        }
        let coerce_after_update = next_if('c');
        let blur = next_if('b');

        if let Some(rest) = chars.next() {
            return Err(ConfigError::invalid_action_order(
                order,
                format!("Unexpected '{rest}'. {hint}"),
            ));
        }

        Ok(Self {
            focus,
            coerce_after_focus,
            coerce_after_update,
            blur,
        })
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Transformer steps, see `ActionOrder`
    pub action_order: String,

    /// Skip update for assignments that produced a pre-update message
    pub freeze_structures_with_messages: bool,

    /// Abort the run when coerce fails after an update
    pub break_if_coerce_after_update_failed: bool,

    /// Signal imprecision on a possible (non-definite) precondition match
    pub refine_on_unknown_precondition: bool,

    /// Location persistence scheme
    pub save_locations: SaveLocations,

    /// Worklist order
    pub worklist_order: WorklistOrder,

    /// Live-structure ceiling; 0 disables it
    pub max_structures: usize,

    /// Log progress every N joined structures; 0 disables it
    pub dump_every: usize,

    /// Maximum structures one focus call may produce (1..=10_000_000)
    pub focus_limit: usize,

    /// Collapse chains of unreported skip locations before the run
    pub remove_skip_chains: bool,

    /// Reverse every CFG edge as it is added
    pub backward_analysis: bool,

    /// Record (location, structure) transitions during the run
    pub transition_relation: bool,

    /// Re-evaluate message formulas on the final structures
    pub check_messages_at_fixpoint: bool,

    /// Per-step structure dumps at info level
    pub verbose: bool,
}

fn default_action_order() -> String {
    "fpucb".to_string()
}

fn default_focus_limit() -> usize {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_order: default_action_order(),
            freeze_structures_with_messages: false,
            break_if_coerce_after_update_failed: false,
            refine_on_unknown_precondition: false,
            save_locations: SaveLocations::default(),
            worklist_order: WorklistOrder::default(),
            max_structures: 0,
            dump_every: 0,
            focus_limit: default_focus_limit(),
            remove_skip_chains: false,
            backward_analysis: false,
            transition_relation: false,
            check_messages_at_fixpoint: false,
            verbose: false,
        }
    }
}

impl EngineConfig {
    /// Configuration for a preset
    pub fn preset(preset: Preset) -> Self {
        let base = Self::default();
        match preset {
            Preset::Default => base,
            Preset::Strict => Self {
                break_if_coerce_after_update_failed: true,
                refine_on_unknown_precondition: true,
                ..base
            },
            Preset::Diagnostic => Self {
                verbose: true,
                transition_relation: true,
                check_messages_at_fixpoint: true,
                ..base
            },
        }
    }

    /// Builder: live-structure ceiling
    pub fn with_max_structures(mut self, max_structures: usize) -> Self {
        self.max_structures = max_structures;
        self
    }

    /// Builder: action order string
    pub fn with_action_order(mut self, order: impl Into<String>) -> Self {
        self.action_order = order.into();
        self
    }

    /// Builder: persistence scheme
    pub fn with_save_locations(mut self, save_locations: SaveLocations) -> Self {
        self.save_locations = save_locations;
        self
    }

    /// Builder: transition relation recording
    pub fn with_transition_relation(mut self, enabled: bool) -> Self {
        self.transition_relation = enabled;
        self
    }

    /// Parsed transformer steps
    pub fn action_order(&self) -> ConfigResult<ActionOrder> {
        ActionOrder::parse(&self.action_order)
    }

    /// Load from a YAML string
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Export as YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate all fields
    pub fn validate(&self) -> ConfigResult<()> {
        ActionOrder::parse(&self.action_order)?;

        if !(1..=10_000_000).contains(&self.focus_limit) {
            return Err(ConfigError::range_with_hint(
                "focus_limit",
                self.focus_limit,
                1,
                10_000_000,
                "Use 10000 for typical analyses",
            ));
        }

        Ok(())
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        EngineConfig::validate(self)
    }

    fn config_name(&self) -> &'static str {
        "EngineConfig"
    }
}
