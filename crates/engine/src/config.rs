//! Tolerances and text markers driving every matcher.
//!
//! Defaults reproduce the production constants; a TOML file may override any
//! subset of them.

use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use conciliar_core::REFERENCE_TAIL_LEN;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid pattern for {name}: {source}")]
    Pattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum absolute difference between a bank amount and its counterpart.
    pub amount_tolerance: Decimal,
    /// Maximum difference between aggregate bank fees and registry fee postings.
    pub commission_tolerance: Decimal,
    /// Characters of a reference kept for comparison.
    pub reference_tail_len: usize,
    /// Characters that must agree exactly for a transfer.
    pub transfer_tail_len: usize,
    /// How many days the bank may record a payment before the book does.
    pub max_bank_lead_days: i64,
    /// How many days the bank may record a payment after the book does.
    pub max_bank_lag_days: i64,
    /// Only reconcile sales legs whose counterpart bank contains this text.
    pub sales_bank_filter: Option<String>,
    /// Whether an expense matched on amount alone takes the bank row while
    /// it waits for review.
    pub claim_ambiguous_expenses: bool,
    pub settlement: SettlementConfig,
    pub markers: MarkerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(10, 2),
            commission_tolerance: Decimal::ONE,
            reference_tail_len: REFERENCE_TAIL_LEN,
            transfer_tail_len: 5,
            max_bank_lead_days: 1,
            max_bank_lag_days: 5,
            sales_bank_filter: None,
            claim_ambiguous_expenses: true,
            settlement: SettlementConfig::default(),
            markers: MarkerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub min_business_days: u32,
    pub max_business_days: u32,
    /// Lowest variance (percent) still considered a normal merchant discount.
    pub variance_min: Decimal,
    /// Highest variance (percent) still considered a normal merchant discount.
    pub variance_max: Decimal,
    /// Above this variance the difference is excessive rather than high.
    pub review_ceiling: Decimal,
    /// Unassigned batches this close to the cutoff are in transit.
    pub in_transit_days: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            min_business_days: 1,
            max_business_days: 6,
            variance_min: Decimal::NEGATIVE_ONE,
            variance_max: Decimal::new(35, 1),
            review_ceiling: Decimal::new(25, 0),
            in_transit_days: 3,
        }
    }
}

/// Regular expressions (matched case-insensitively) and sentinel lists.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub mobile_method: String,
    pub transfer_method: String,
    pub card_method: String,
    pub mobile_description: String,
    pub transfer_description: String,
    pub card_description: String,
    /// Trailing bank row auto-linked to the match above it.
    pub linked_commission: String,
    /// Bank debit descriptions treated as fees.
    pub bank_fee: String,
    /// Registry note types or names that post bank fees.
    pub registry_commission: String,
    /// Registry references meaning "paid, reference unknown".
    pub unidentified_references: Vec<String>,
    /// Bank references marking page, day and balance lines.
    pub noise_references: Vec<String>,
    /// Text that leaks into amount cells of those lines.
    pub noise_amount_text: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            mobile_method: "OTR".to_string(),
            transfer_method: "TRA".to_string(),
            card_method: "TJD|TAR|DEB|PUN".to_string(),
            mobile_description: "PAGO MOVIL".to_string(),
            transfer_description: "TRANSFERENCIA".to_string(),
            card_description: r"TDD|PUNTO|\bPOS\b|CARACAS|LIQUIDACION".to_string(),
            linked_commission: "COMISION".to_string(),
            bank_fee: "COMISION|ISLR|IGTF|IMPUESTO|MANTENIMIENTO|GASTOS|ADMINISTRACION|\
                       SERV AL CARACAS|EMISION.*ESTADO DE CUENTA"
                .to_string(),
            registry_commission: "COMISIONES BANCARIAS|GASTOS BANCARIOS".to_string(),
            unidentified_references: vec!["SIN_REF".to_string(), "PAGO NO IDENTIFICADO".to_string()],
            noise_references: ["FIN", "DIA", "SALDO", "TOTAL", "PAGINA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            noise_amount_text: "FIN".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amount_tolerance < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                name: "amount_tolerance",
                reason: "must not be negative".to_string(),
            });
        }
        if self.reference_tail_len == 0 || self.transfer_tail_len == 0 {
            return Err(ConfigError::Invalid {
                name: "reference_tail_len",
                reason: "reference tails must keep at least one character".to_string(),
            });
        }
        let s = &self.settlement;
        if s.min_business_days > s.max_business_days {
            return Err(ConfigError::Invalid {
                name: "settlement.min_business_days",
                reason: format!("{} exceeds max {}", s.min_business_days, s.max_business_days),
            });
        }
        if s.variance_min > s.variance_max || s.variance_max > s.review_ceiling {
            return Err(ConfigError::Invalid {
                name: "settlement.variance_max",
                reason: "expected variance_min <= variance_max <= review_ceiling".to_string(),
            });
        }
        Ok(())
    }
}

/// `MarkerConfig` with its patterns compiled.
#[derive(Debug, Clone)]
pub struct Markers {
    pub mobile_method: Regex,
    pub transfer_method: Regex,
    pub card_method: Regex,
    pub mobile_description: Regex,
    pub transfer_description: Regex,
    pub card_description: Regex,
    pub linked_commission: Regex,
    pub bank_fee: Regex,
    pub registry_commission: Regex,
    pub noise_amount_text: Regex,
    unidentified_references: Vec<String>,
    noise_references: Vec<String>,
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Pattern { name, source })
}

impl Markers {
    pub fn compile(config: &MarkerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            mobile_method: compile("mobile_method", &config.mobile_method)?,
            transfer_method: compile("transfer_method", &config.transfer_method)?,
            card_method: compile("card_method", &config.card_method)?,
            mobile_description: compile("mobile_description", &config.mobile_description)?,
            transfer_description: compile("transfer_description", &config.transfer_description)?,
            card_description: compile("card_description", &config.card_description)?,
            linked_commission: compile("linked_commission", &config.linked_commission)?,
            bank_fee: compile("bank_fee", &config.bank_fee)?,
            registry_commission: compile("registry_commission", &config.registry_commission)?,
            noise_amount_text: compile("noise_amount_text", &config.noise_amount_text)?,
            unidentified_references: config
                .unidentified_references
                .iter()
                .map(|s| s.trim().to_uppercase())
                .collect(),
            noise_references: config
                .noise_references
                .iter()
                .map(|s| s.trim().to_uppercase())
                .collect(),
        })
    }

    pub fn is_unidentified_reference(&self, reference: &str) -> bool {
        let upper = reference.trim().to_uppercase();
        self.unidentified_references.iter().any(|r| *r == upper)
    }

    pub fn is_noise_reference(&self, reference: &str) -> bool {
        let upper = reference.trim().to_uppercase();
        self.noise_references.iter().any(|r| *r == upper)
    }
}
