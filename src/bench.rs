//! Benchmark driver for delivery backends.
//!
//! Runs timed repetitions of each transaction phase against one backend,
//! holding envelope construction outside the timed region. Phases a backend
//! does not support (non-atomic submission) or cannot safely repeat
//! (non-idempotent body) are skipped, not failed.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::{
    error::Result,
    fabricator::Fabricator,
    status::MultiStatus,
    target::{Delivery, DeliveryTarget},
};

/// Benchmark configuration surface.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Timed iterations per phase.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Caller-declared property of the backend: body submission does not
    /// mutate shared header/body buffers and the same pair may be reused
    /// across transactions. The protocol cannot verify this; a backend that
    /// claims it but mutates shared buffers is defective.
    #[serde(default)]
    pub idempotent_body: bool,
    /// Sender address for every transaction.
    pub sender: String,
    /// Recipient address templates, each containing one `{}` placeholder
    /// substituted with the iteration index to avoid duplicate-recipient
    /// artifacts.
    pub recipient_templates: Vec<String>,
}

const fn default_iterations() -> usize {
    100
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            idempotent_body: true,
            sender: "sender@example.org".to_string(),
            recipient_templates: vec!["rcpt-{}@example.org".to_string()],
        }
    }
}

/// A benchmarked transaction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Transaction start (and untimed abort).
    Start,
    /// Recipient addition.
    AddRcpt,
    /// Atomic body submission.
    Body,
    /// Non-atomic body submission.
    BodyNonAtomic,
    /// Start through commit.
    FullTransaction,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::AddRcpt => "add_rcpt",
            Self::Body => "body",
            Self::BodyNonAtomic => "body_non_atomic",
            Self::FullTransaction => "full_transaction",
        })
    }
}

/// Outcome of one benchmarked phase.
#[derive(Debug, Clone)]
pub enum PhaseReport {
    /// The phase ran; wall time covers only the measured operations.
    Measured {
        /// Which phase.
        phase: Phase,
        /// Timed iterations performed.
        iterations: usize,
        /// Total wall time inside the timed region.
        total: Duration,
        /// Mean wall time per iteration.
        mean: Duration,
    },
    /// The phase was skipped for this backend.
    Skipped {
        /// Which phase.
        phase: Phase,
        /// Why it was skipped.
        reason: &'static str,
    },
}

impl PhaseReport {
    fn measured(phase: Phase, iterations: usize, total: Duration) -> Self {
        let mean = u32::try_from(iterations)
            .ok()
            .and_then(|n| total.checked_div(n))
            .unwrap_or_default();
        Self::Measured {
            phase,
            iterations,
            total,
            mean,
        }
    }

    fn skipped(phase: Phase, reason: &'static str) -> Self {
        tracing::debug!(%phase, reason, "skipping benchmark phase");
        Self::Skipped { phase, reason }
    }

    /// Which phase this report covers.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Measured { phase, .. } | Self::Skipped { phase, .. } => *phase,
        }
    }

    /// Whether the phase was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Substitute the positional placeholder in a recipient template.
#[must_use]
pub fn expand_template(template: &str, index: usize) -> String {
    template.replace("{}", &index.to_string())
}

/// Drives the five protocol phases against a backend and reports per-phase
/// wall time.
#[derive(Debug, Clone, Default)]
pub struct BenchDriver {
    fabricator: Fabricator,
    config: BenchConfig,
}

impl BenchDriver {
    /// Create a driver.
    #[must_use]
    pub const fn new(fabricator: Fabricator, config: BenchConfig) -> Self {
        Self { fabricator, config }
    }

    /// Run every phase against `target`.
    ///
    /// # Errors
    /// If any backend operation fails unexpectedly. Failures abort the
    /// in-flight transaction before propagating, so no resources leak.
    pub async fn run(&self, target: &dyn DeliveryTarget) -> Result<Vec<PhaseReport>> {
        Ok(vec![
            self.bench_start(target).await?,
            self.bench_add_rcpt(target).await?,
            self.bench_body(target).await?,
            self.bench_body_non_atomic(target).await?,
            self.bench_full_transaction(target).await?,
        ])
    }

    fn recipients(&self) -> impl Iterator<Item = String> {
        self.config
            .recipient_templates
            .iter()
            .enumerate()
            .map(|(i, template)| expand_template(template, i))
    }

    async fn add_all_recipients(&self, delivery: &mut dyn Delivery) -> Result<()> {
        for rcpt in self.recipients() {
            delivery.add_rcpt(&rcpt).await?;
        }
        Ok(())
    }

    async fn bench_start(&self, target: &dyn DeliveryTarget) -> Result<PhaseReport> {
        let (meta, _, _) = self.fabricator.build("bench/start");

        let mut deliveries = Vec::with_capacity(self.config.iterations);
        let timer = Instant::now();
        for _ in 0..self.config.iterations {
            deliveries.push(target.start(&meta, &self.config.sender).await?);
        }
        let total = timer.elapsed();

        // Kept outside the timed region to avoid measuring cleanup.
        for delivery in deliveries {
            delivery.abort().await;
        }

        Ok(PhaseReport::measured(
            Phase::Start,
            self.config.iterations,
            total,
        ))
    }

    async fn bench_add_rcpt(&self, target: &dyn DeliveryTarget) -> Result<PhaseReport> {
        let (meta, _, _) = self.fabricator.build("bench/add_rcpt");

        let mut delivery = target.start(&meta, &self.config.sender).await?;
        let templates = &self.config.recipient_templates;

        let mut total = Duration::ZERO;
        for i in 0..self.config.iterations {
            let rcpt = expand_template(&templates[i % templates.len()], i);
            let timer = Instant::now();
            let result = delivery.add_rcpt(&rcpt).await;
            total += timer.elapsed();
            if let Err(err) = result {
                delivery.abort().await;
                return Err(err);
            }
        }
        delivery.abort().await;

        Ok(PhaseReport::measured(
            Phase::AddRcpt,
            self.config.iterations,
            total,
        ))
    }

    async fn bench_body(&self, target: &dyn DeliveryTarget) -> Result<PhaseReport> {
        if !self.config.idempotent_body {
            return Ok(PhaseReport::skipped(
                Phase::Body,
                "non-idempotent body submission",
            ));
        }

        let (meta, header, body) = self.fabricator.build("bench/body");

        // A body attaches at most once per transaction, so each iteration
        // drives a fresh transaction and only the body call is timed.
        let mut total = Duration::ZERO;
        for _ in 0..self.config.iterations {
            let mut delivery = target.start(&meta, &self.config.sender).await?;
            if let Err(err) = self.add_all_recipients(delivery.as_mut()).await {
                delivery.abort().await;
                return Err(err);
            }

            let timer = Instant::now();
            let result = delivery.body(&header, &body).await;
            total += timer.elapsed();

            delivery.abort().await;
            result?;
        }

        Ok(PhaseReport::measured(
            Phase::Body,
            self.config.iterations,
            total,
        ))
    }

    async fn bench_body_non_atomic(&self, target: &dyn DeliveryTarget) -> Result<PhaseReport> {
        if !self.config.idempotent_body {
            return Ok(PhaseReport::skipped(
                Phase::BodyNonAtomic,
                "non-idempotent body submission",
            ));
        }

        let (meta, header, body) = self.fabricator.build("bench/body_non_atomic");

        // Capability probe on a scratch transaction.
        let mut probe = target.start(&meta, &self.config.sender).await?;
        let supported = probe.partial().is_some();
        probe.abort().await;
        if !supported {
            return Ok(PhaseReport::skipped(
                Phase::BodyNonAtomic,
                "backend does not support non-atomic submission",
            ));
        }

        let mut status = MultiStatus::new();
        let mut total = Duration::ZERO;
        for _ in 0..self.config.iterations {
            let mut delivery = target.start(&meta, &self.config.sender).await?;
            if let Err(err) = self.add_all_recipients(delivery.as_mut()).await {
                delivery.abort().await;
                return Err(err);
            }

            if let Some(partial) = delivery.partial() {
                status.clear();
                let timer = Instant::now();
                partial.body_non_atomic(&mut status, &header, &body).await;
                total += timer.elapsed();
            }

            delivery.abort().await;
        }

        Ok(PhaseReport::measured(
            Phase::BodyNonAtomic,
            self.config.iterations,
            total,
        ))
    }

    async fn bench_full_transaction(&self, target: &dyn DeliveryTarget) -> Result<PhaseReport> {
        let (meta, header, body) = self.fabricator.build("bench/full_transaction");

        let mut total = Duration::ZERO;
        for _ in 0..self.config.iterations {
            let timer = Instant::now();

            let mut delivery = target.start(&meta, &self.config.sender).await?;
            if let Err(err) = self.add_all_recipients(delivery.as_mut()).await {
                delivery.abort().await;
                return Err(err);
            }
            if let Err(err) = delivery.body(&header, &body).await {
                delivery.abort().await;
                return Err(err);
            }
            delivery.commit().await?;

            total += timer.elapsed();
        }

        Ok(PhaseReport::measured(
            Phase::FullTransaction,
            self.config.iterations,
            total,
        ))
    }
}
