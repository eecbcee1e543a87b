//! Sample Record Sender
//!
//! Generates random customer records and sends them to the prediction
//! service as NATS requests, logging every reply.

use anyhow::Context;
use clap::Parser;
use deposit_predictor::types::{
    prediction::{Decision, PredictionRequest, PredictionResponse},
    record::{
        Answer, Contact, CustomerRecord, DayOfWeek, Education, Job, Marital, Month,
        PreviousOutcome,
    },
};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "send_records")]
#[command(about = "Send random customer records to the prediction service")]
struct Args {
    /// NATS server URL
    #[arg(long, default_value = "nats://localhost:4222")]
    url: String,

    /// Subject the service listens on
    #[arg(long, default_value = "deposit.predict")]
    subject: String,

    /// Number of records to send
    #[arg(short = 'n', long, default_value_t = 20)]
    count: u64,

    /// Pause between requests in milliseconds
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

/// Random record generator
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
    counter: u64,
}

impl RecordGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            counter: 0,
        }
    }

    fn pick<T: Copy>(&mut self, values: &[T]) -> T {
        values[self.rng.gen_range(0..values.len())]
    }

    /// Generate a random record within the form bounds
    fn generate(&mut self) -> PredictionRequest {
        self.counter += 1;

        let previous = if self.rng.gen_bool(0.8) {
            0
        } else {
            self.rng.gen_range(1..7)
        };
        let poutcome = if previous == 0 {
            PreviousOutcome::Nonexistent
        } else {
            self.pick(&[PreviousOutcome::Failure, PreviousOutcome::Success])
        };

        let record = CustomerRecord {
            age: self.rng.gen_range(18..=95),
            job: self.pick(Job::ALL),
            marital: self.pick(Marital::ALL),
            education: self.pick(Education::ALL),
            credit_default: self.pick(Answer::ALL),
            housing: self.pick(Answer::ALL),
            loan: self.pick(Answer::ALL),
            contact: self.pick(Contact::ALL),
            month: self.pick(Month::ALL),
            day_of_week: self.pick(DayOfWeek::ALL),
            campaign: self.rng.gen_range(1..=10),
            pdays: if previous == 0 { 0 } else { self.rng.gen_range(1..=27) },
            previous,
            poutcome,
            cons_price_idx: round3(self.rng.gen_range(92.2..94.8)),
            cons_conf_idx: round3(self.rng.gen_range(-50.8..-26.9)),
            euribor3m: round3(self.rng.gen_range(0.63..5.05)),
        };

        PredictionRequest {
            request_id: Some(format!("rec_{:06}", self.counter)),
            record,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("send_records=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!(
        url = %args.url,
        subject = %args.subject,
        count = args.count,
        delay_ms = args.delay_ms,
        "Starting sample record sender"
    );

    let client = async_nats::connect(&args.url)
        .await
        .context(format!("Failed to connect to NATS at {}", args.url))?;
    info!("Connected to NATS");

    let mut generator = RecordGenerator::new();
    let mut yes = 0u64;
    let mut failed = 0u64;

    for i in 0..args.count {
        let request = generator.generate();
        let payload = serde_json::to_vec(&request)?;

        let reply = match client.request(args.subject.clone(), payload.into()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(request_id = ?request.request_id, error = %e, "Request failed");
                failed += 1;
                continue;
            }
        };

        match serde_json::from_slice::<PredictionResponse>(&reply.payload) {
            Ok(response) => {
                if let Some(error) = &response.error {
                    failed += 1;
                    warn!(
                        request_id = ?response.request_id,
                        kind = %error.kind,
                        message = %error.message,
                        "Prediction error"
                    );
                } else {
                    if response.decision == Some(Decision::Yes) {
                        yes += 1;
                    }
                    info!(
                        request_id = ?response.request_id,
                        decision = ?response.decision,
                        probability = ?response.probability,
                        threshold = response.threshold,
                        degraded = response.degraded,
                        "Prediction received"
                    );
                }
            }
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Unreadable reply");
            }
        }

        if (i + 1) % 10 == 0 {
            info!("Sent {}/{} records ({} YES, {} failed)", i + 1, args.count, yes, failed);
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    info!(
        "Completed! Sent {} records ({} YES, {} failed)",
        args.count, yes, failed
    );

    Ok(())
}
