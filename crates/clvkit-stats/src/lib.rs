//! Numerical building blocks for customer-value analysis.
//!
//! This crate provides the statistical tools the customer models are built on:
//!
//! - **Percentiles**: Compute and store interpolated percentile values
//! - **Descriptive statistics**: Count, sum, mean, median, spread of a column
//! - **Outlier suppression**: Quantile-IQR clipping of heavy-tailed columns
//! - **Binning**: Equal-frequency (quantile) bucket assignment
//! - **Special functions**: Log-gamma and the Gauss hypergeometric function
//! - **Optimization**: Nelder-Mead simplex minimization
//!
//! # Modules
//!
//! - [`percentiles`]: Percentile computation and storage
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`outlier`]: Outlier thresholds and replacement
//! - [`binning`]: Quantile bucketing with deterministic tie-breaking
//! - [`special`]: Special functions used by likelihoods
//! - [`optimize`]: Derivative-free minimizer for maximum-likelihood fits
//!
//! # Examples
//!
//! ## Clipping outliers
//!
//! ```
//! use clvkit_stats::outlier::replace_with_thresholds;
//!
//! let mut spend = vec![10.0; 300];
//! spend.push(1.0e6);
//! let thresholds = replace_with_thresholds(&mut spend).unwrap();
//! assert_eq!(spend[300], thresholds.high.round());
//! ```
//!
//! ## Computing percentiles
//!
//! ```
//! use clvkit_stats::percentiles::Percentiles;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
//! assert_eq!(percentiles.get(50.0), Some(3.0));
//! ```
//!
//! ## Quantile buckets
//!
//! ```
//! use clvkit_stats::binning::equal_frequency_bins;
//!
//! let scores = [0.3, 9.1, 4.2, 7.7, 1.5, 5.0, 8.8, 2.2];
//! let bins = equal_frequency_bins(&scores, 4);
//! assert_eq!(bins, vec![0, 3, 1, 2, 0, 2, 3, 1]);
//! ```

pub mod binning;
pub mod descriptive;
pub mod optimize;
pub mod outlier;
pub mod percentiles;
pub mod special;
