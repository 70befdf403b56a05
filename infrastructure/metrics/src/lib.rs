// Copyright 2025. The Somnia Agents Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! A process-global prometheus registry with registration helpers.
//!
//! The application installs a registry once at startup (typically with some identifying labels)
//! and modules register their meters lazily against it.

use std::sync::RwLock;

use once_cell::sync::Lazy;
use prometheus::{Encoder, Opts, TextEncoder};
pub use prometheus::{
    Histogram,
    HistogramOpts,
    HistogramVec,
    IntCounter,
    IntCounterVec,
    IntGauge,
    IntGaugeVec,
    Registry,
};
use thiserror::Error;

static DEFAULT_REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::new()));

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("Metrics output was not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Replace the process-global registry. Meters registered before this call stay attached to the
/// previous registry, so the application should install its registry before any are created.
pub fn set_default_registry(registry: Registry) {
    *DEFAULT_REGISTRY.write().unwrap() = registry;
}

pub fn get_default_registry() -> Registry {
    DEFAULT_REGISTRY.read().unwrap().clone()
}

pub fn register_int_counter(name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let counter = IntCounter::new(name, help)?;
    get_default_registry().register(Box::new(counter.clone()))?;
    Ok(counter)
}

pub fn register_int_counter_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntCounterVec, MetricsError> {
    let counter = IntCounterVec::new(Opts::new(name, help), label_names)?;
    get_default_registry().register(Box::new(counter.clone()))?;
    Ok(counter)
}

pub fn register_int_gauge(name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    let gauge = IntGauge::new(name, help)?;
    get_default_registry().register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

pub fn register_int_gauge_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntGaugeVec, MetricsError> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), label_names)?;
    get_default_registry().register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

pub fn register_histogram_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<HistogramVec, MetricsError> {
    let histogram = HistogramVec::new(HistogramOpts::new(name, help), label_names)?;
    get_default_registry().register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Encode all meters of the default registry in the prometheus text exposition format.
pub fn render() -> Result<String, MetricsError> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&get_default_registry().gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_and_render() {
        let counter = register_int_counter("test_render_counter", "A test counter").unwrap();
        counter.inc();
        let output = render().unwrap();
        assert!(output.contains("test_render_counter 1"));
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        register_int_gauge("test_duplicate_gauge", "A test gauge").unwrap();
        let err = register_int_gauge("test_duplicate_gauge", "A test gauge");
        assert!(err.is_err());
    }

    #[test]
    fn vec_meters_accept_labels() {
        let counter =
            register_int_counter_vec("test_labelled_counter", "A labelled counter", &["kind"]).unwrap();
        counter.with_label_values(&["a"]).inc();
        counter.with_label_values(&["b"]).inc_by(2);
        let output = render().unwrap();
        assert!(output.contains("test_labelled_counter{kind=\"a\"} 1"));
        assert!(output.contains("test_labelled_counter{kind=\"b\"} 2"));
    }
}
