//! Synthetic transaction histories drawn from the model's generative process
//!
//! Each simulated customer:
//!
//! 1. Makes a first purchase on a day drawn uniformly between the start date
//!    and the cutoff date.
//! 2. Draws a purchase rate `λ ~ Gamma(r, 1/α)` and a dropout probability
//!    `p ~ Beta(a, b)`.
//! 3. Purchases again after `Exp(λ)` waiting times until the cutoff, becoming
//!    inactive after each repeat purchase with probability `p`.
//! 4. Draws a spend rate `ν ~ Gamma(q, 1/v)`; each purchase is worth
//!    `Gamma(p, 1/ν)`.
//!
//! The same seed always yields the same histories.

use chrono::{Days, NaiveDate};
use rand::{Rng, SeedableRng as _};
use rand_distr::{Beta, Distribution as _, Exp, Gamma};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{
    bgnbd::BetaGeoParams, customer::TimeUnit, gamma_gamma::GammaGammaParams,
    transaction::InvoiceLine,
};

/// Invalid simulation settings.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SimulationError {
    #[display("cutoff {cutoff} must be after start {start}")]
    EmptyPeriod { start: NaiveDate, cutoff: NaiveDate },
    #[display("parameter {name} must be finite and positive, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Settings for [`simulate_customers`] and [`simulate_invoices`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub customers: usize,
    pub frequency: BetaGeoParams,
    pub monetary: GammaGammaParams,
    /// Earliest possible first purchase
    pub start: NaiveDate,
    pub cutoff: NaiveDate,
    /// Unit the frequency parameters are expressed in
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub country: Option<String>,
}

/// One simulated customer history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedCustomer {
    pub customer_id: String,
    pub first_purchase: NaiveDate,
    /// Observation period length `T` in time units
    pub observation: f64,
    /// Purchase times relative to the first purchase, starting with `0.0`
    pub purchase_times: Vec<f64>,
    /// Value of each purchase
    pub values: Vec<f64>,
}

impl SimulatedCustomer {
    /// Number of purchases after the first one.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn repeat_purchases(&self) -> f64 {
        (self.purchase_times.len() - 1) as f64
    }

    /// Time of the last purchase relative to the first one.
    #[must_use]
    pub fn recency(&self) -> f64 {
        self.purchase_times.last().copied().unwrap_or_default()
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<f64, SimulationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimulationError::InvalidParameter { name, value })
    }
}

/// Simulates customer histories in continuous time.
///
/// # Errors
///
/// Returns [`SimulationError`] for an empty period or non-positive
/// parameters.
pub fn simulate_customers(
    config: &SimulationConfig,
) -> Result<Vec<SimulatedCustomer>, SimulationError> {
    let span = (config.cutoff - config.start).num_days();
    if span <= 0 {
        return Err(SimulationError::EmptyPeriod {
            start: config.start,
            cutoff: config.cutoff,
        });
    }
    let BetaGeoParams { r, alpha, a, b } = config.frequency;
    let GammaGammaParams { p, q, v } = config.monetary;
    let invalid = |name, value| SimulationError::InvalidParameter { name, value };

    let rate = Gamma::new(check_positive("r", r)?, 1.0 / check_positive("alpha", alpha)?)
        .map_err(|_| invalid("r", r))?;
    let dropout =
        Beta::new(check_positive("a", a)?, check_positive("b", b)?).map_err(|_| invalid("a", a))?;
    let spend_rate = Gamma::new(check_positive("q", q)?, 1.0 / check_positive("v", v)?)
        .map_err(|_| invalid("q", q))?;
    check_positive("p", p)?;

    let mut rng = Pcg32::seed_from_u64(config.seed);
    let mut customers = Vec::with_capacity(config.customers);
    for index in 0..config.customers {
        let offset = rng.random_range(0..span);
        let first_purchase = config.start + Days::new(offset.unsigned_abs());
        let observation = config.time_unit.from_days(span - offset);

        let lambda = rate.sample(&mut rng);
        let p_drop = dropout.sample(&mut rng);
        let mut purchase_times = vec![0.0];
        if let Ok(waiting) = Exp::new(lambda) {
            let mut time = 0.0;
            loop {
                time += waiting.sample(&mut rng);
                if time > observation {
                    break;
                }
                purchase_times.push(time);
                if rng.random::<f64>() < p_drop {
                    break;
                }
            }
        }

        let nu = spend_rate.sample(&mut rng);
        let values = match Gamma::new(p, 1.0 / nu) {
            Ok(value) => purchase_times
                .iter()
                .map(|_| value.sample(&mut rng))
                .collect(),
            Err(_) => vec![config.monetary.population_mean(); purchase_times.len()],
        };

        customers.push(SimulatedCustomer {
            customer_id: (10_000 + index).to_string(),
            first_purchase,
            observation,
            purchase_times,
            values,
        });
    }

    tracing::debug!(
        customers = customers.len(),
        seed = config.seed,
        "simulated customer histories"
    );
    Ok(customers)
}

/// Simulates customers and writes their purchases as invoice lines.
///
/// Every purchase becomes one single-unit invoice line priced at the
/// purchase value rounded to cents.
///
/// # Errors
///
/// Returns [`SimulationError`] for an empty period or non-positive
/// parameters.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use clvkit_models::{
///     bgnbd::BetaGeoParams,
///     customer::TimeUnit,
///     gamma_gamma::GammaGammaParams,
///     simulate::{SimulationConfig, simulate_invoices},
/// };
///
/// let config = SimulationConfig {
///     customers: 50,
///     frequency: BetaGeoParams { r: 0.8, alpha: 4.0, a: 0.5, b: 3.0 },
///     monetary: GammaGammaParams { p: 6.0, q: 4.0, v: 15.0 },
///     start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
///     cutoff: NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
///     time_unit: TimeUnit::Week,
///     seed: 7,
///     country: None,
/// };
/// let lines = simulate_invoices(&config).unwrap();
/// assert!(lines.len() >= 50);
/// assert_eq!(lines, simulate_invoices(&config).unwrap());
/// ```
pub fn simulate_invoices(config: &SimulationConfig) -> Result<Vec<InvoiceLine>, SimulationError> {
    let customers = simulate_customers(config)?;
    let days_per_unit = config.time_unit.days();

    let mut lines = vec![];
    for customer in &customers {
        for (time, value) in customer.purchase_times.iter().zip(&customer.values) {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let day = (time * days_per_unit).floor() as u64;
            lines.push(InvoiceLine {
                invoice: (500_000 + lines.len()).to_string(),
                customer_id: Some(customer.customer_id.clone()),
                invoice_date: customer.first_purchase + Days::new(day),
                quantity: 1.0,
                price: ((value * 100.0).round() / 100.0).max(0.01),
                country: config.country.clone(),
            });
        }
    }
    Ok(lines)
}
