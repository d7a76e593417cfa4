use std::cmp::Ordering;
use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::settings::GeneralSettings;
use crate::types::compare_f64;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            engine: EngineConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value = env_string("BOX_CALCULATOR_API_HOST")
            .unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    "⚠️ Could not parse BOX_CALCULATOR_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("BOX_CALCULATOR_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        "⚠️ BOX_CALCULATOR_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        "⚠️ Could not parse BOX_CALCULATOR_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Engine defaults applied to requests that leave settings unset.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Catalog-wide clearance defaults for the settings resolver.
    pub general: GeneralSettings,
    /// Padding used when a request does not send one.
    pub box_padding: f64,
    /// Packaging weight in kg per m³ of carton volume.
    pub packaging_weight_multiplier: f64,
    /// Whether responses carry the calculation trace unless asked otherwise.
    pub trace_by_default: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            box_padding: Self::DEFAULT_BOX_PADDING,
            packaging_weight_multiplier: Self::DEFAULT_PACKAGING_WEIGHT_MULTIPLIER,
            trace_by_default: false,
        }
    }
}

impl EngineConfig {
    pub const DEFAULT_BOX_PADDING: f64 = 0.0;
    pub const DEFAULT_PACKAGING_WEIGHT_MULTIPLIER: f64 = 0.0;

    const SIDE_MARGIN_VAR: &'static str = "BOX_CALCULATOR_DEFAULT_SIDE_MARGIN";
    const FRONT_MARGIN_VAR: &'static str = "BOX_CALCULATOR_DEFAULT_FRONT_MARGIN";
    const TOP_MARGIN_VAR: &'static str = "BOX_CALCULATOR_DEFAULT_TOP_MARGIN";
    const GAP_XY_VAR: &'static str = "BOX_CALCULATOR_DEFAULT_GAP_XY";
    const GAP_Z_VAR: &'static str = "BOX_CALCULATOR_DEFAULT_GAP_Z";
    const MAX_STACK_LAYERS_VAR: &'static str = "BOX_CALCULATOR_DEFAULT_MAX_STACK_LAYERS";
    const BOX_PADDING_VAR: &'static str = "BOX_CALCULATOR_BOX_PADDING";
    const PACKAGING_MULTIPLIER_VAR: &'static str = "BOX_CALCULATOR_PACKAGING_WEIGHT_MULTIPLIER";
    const TRACE_VAR: &'static str = "BOX_CALCULATOR_TRACE";

    fn from_env() -> Self {
        let non_negative = |value: f64| value >= 0.0 && value.is_finite();

        let general = GeneralSettings {
            default_side_margin: load_optional_f64(Self::SIDE_MARGIN_VAR, non_negative),
            default_front_margin: load_optional_f64(Self::FRONT_MARGIN_VAR, non_negative),
            default_top_margin: load_optional_f64(Self::TOP_MARGIN_VAR, non_negative),
            default_gap_xy: load_optional_f64(Self::GAP_XY_VAR, non_negative),
            default_gap_z: load_optional_f64(Self::GAP_Z_VAR, non_negative),
            default_max_stack_layers: load_optional_u32(Self::MAX_STACK_LAYERS_VAR),
        };

        let box_padding = load_f64_with_warning(
            Self::BOX_PADDING_VAR,
            Self::DEFAULT_BOX_PADDING,
            non_negative,
            "must be a finite value >= 0",
            "Box padding shrinks the usable floor of every carton",
        );

        let packaging_weight_multiplier = load_f64_with_warning(
            Self::PACKAGING_MULTIPLIER_VAR,
            Self::DEFAULT_PACKAGING_WEIGHT_MULTIPLIER,
            non_negative,
            "must be a finite value >= 0",
            "Packaging weight is added to every shipment",
        );

        let trace_by_default = env_string(Self::TRACE_VAR)
            .and_then(|raw| parse_bool(&raw, Self::TRACE_VAR))
            .unwrap_or(false);

        Self {
            general,
            box_padding,
            packaging_weight_multiplier,
            trace_by_default,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name,
                err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn parse_f64(raw: &str, var_name: &str, validator: impl Fn(f64) -> bool) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(value) if validator(value) => Some(value),
        Ok(_) => {
            tracing::warn!(
                "⚠️ {} contains invalid value '{}'. Ignoring it.",
                var_name,
                raw
            );
            None
        }
        Err(err) => {
            tracing::warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Ignoring it.",
                var_name,
                raw,
                err
            );
            None
        }
    }
}

fn load_optional_f64(var_name: &str, validator: impl Fn(f64) -> bool) -> Option<f64> {
    env_string(var_name).and_then(|raw| parse_f64(&raw, var_name, validator))
}

fn load_optional_u32(var_name: &str) -> Option<u32> {
    let raw = env_string(var_name)?;
    match raw.parse::<u32>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                "⚠️ Could not parse {} ('{}') as layer count: {}. Ignoring it.",
                var_name,
                raw,
                err
            );
            None
        }
    }
}

/// Reads a number with fallback to `default`.
///
/// Rejected or unparsable values are logged and ignored. An accepted value
/// that differs from the default is announced with `notice`.
fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    let Some(raw) = env_string(var_name) else {
        return default;
    };
    let value = match raw.parse::<f64>() {
        Ok(value) if validator(value) => value,
        Ok(_) => {
            tracing::warn!(
                "⚠️ {} = '{}' rejected ({}). Falling back to {}.",
                var_name,
                raw,
                invalid_hint,
                default
            );
            return default;
        }
        Err(err) => {
            tracing::warn!(
                "⚠️ {} = '{}' is not a number ({}). Falling back to {}.",
                var_name,
                raw,
                err,
                default
            );
            return default;
        }
    };
    if compare_f64(value, default) != Ordering::Equal {
        tracing::info!("ℹ️ {} ({} = {}).", notice, var_name, value);
    }
    value
}
