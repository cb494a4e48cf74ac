//! Signature ID allocation.
//!
//! IDs are handed out by an explicit counter seeded from `MaxSignId`. The
//! counter is atomic so one provider can be shared through an `Arc`.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

lazy_static! {
    static ref STAND_ID: Regex = Regex::new(r"s(\d+)").unwrap();
}

/// Allocates signature IDs.
pub trait SignIdProvider: Send + Sync {
    /// Seed the counter from the current `MaxSignId`. The counter never
    /// moves backwards, so a shared provider keeps IDs it already handed out.
    fn set_current_max(&self, max_sign_id: &str) -> Result<()>;

    /// Advance the counter and return the new ID.
    fn increment_and_get(&self) -> String;

    /// The most recently allocated ID.
    fn current(&self) -> String;

    /// Numeric index of an ID in this format.
    fn parse(&self, id: &str) -> Result<u32>;
}

/// Which provider a signer creates by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignIdFormat {
    /// `1`, `2`, … or `001`, `002`, … with a zero prefix
    Number {
        /// Pad to three digits
        zero_prefix: bool,
    },
    /// `s001`, `s002`, …
    Stand,
}

impl SignIdFormat {
    /// A fresh provider of this format, starting at zero.
    pub fn provider(&self) -> Arc<dyn SignIdProvider> {
        match self {
            SignIdFormat::Number { zero_prefix } => {
                Arc::new(NumberFormatSignId::with_zero_prefix(*zero_prefix))
            },
            SignIdFormat::Stand => Arc::new(StandFormatSignId::new()),
        }
    }
}

fn parse_number(id: &str) -> Result<u32> {
    id.trim()
        .parse()
        .map_err(|_| Error::InvalidStructure(format!("signature ID '{}' is not a number", id)))
}

/// Plain numeric IDs.
#[derive(Debug, Default)]
pub struct NumberFormatSignId {
    counter: AtomicU32,
    zero_prefix: bool,
}

impl NumberFormatSignId {
    /// Start at zero without padding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at zero, padding to three digits when `zero_prefix` is set.
    pub fn with_zero_prefix(zero_prefix: bool) -> Self {
        Self {
            counter: AtomicU32::new(0),
            zero_prefix,
        }
    }

    fn format(&self, n: u32) -> String {
        if self.zero_prefix {
            format!("{:03}", n)
        } else {
            n.to_string()
        }
    }
}

impl SignIdProvider for NumberFormatSignId {
    fn set_current_max(&self, max_sign_id: &str) -> Result<()> {
        self.counter.fetch_max(self.parse(max_sign_id)?, Ordering::SeqCst);
        Ok(())
    }

    fn increment_and_get(&self) -> String {
        self.format(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn current(&self) -> String {
        self.format(self.counter.load(Ordering::SeqCst))
    }

    fn parse(&self, id: &str) -> Result<u32> {
        parse_number(id)
    }
}

/// `s` followed by a three-digit index.
#[derive(Debug, Default)]
pub struct StandFormatSignId {
    counter: AtomicU32,
}

impl StandFormatSignId {
    /// Start at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignIdProvider for StandFormatSignId {
    fn set_current_max(&self, max_sign_id: &str) -> Result<()> {
        self.counter.fetch_max(self.parse(max_sign_id)?, Ordering::SeqCst);
        Ok(())
    }

    fn increment_and_get(&self) -> String {
        format!("s{:03}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn current(&self) -> String {
        format!("s{:03}", self.counter.load(Ordering::SeqCst))
    }

    /// Accepts `s<digits>` and plain numbers.
    fn parse(&self, id: &str) -> Result<u32> {
        match STAND_ID.captures(id) {
            Some(caps) => parse_number(&caps[1]),
            None => parse_number(id),
        }
    }
}
