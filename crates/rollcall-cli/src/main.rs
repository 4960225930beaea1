use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn identify(
        &self,
        course_id: &str,
        caller_id: &str,
        caller_role: &str,
        probe: &str,
    ) -> zbus::Result<String>;

    async fn batch_identify(
        &self,
        course_id: &str,
        caller_id: &str,
        caller_role: &str,
        probes: &str,
    ) -> zbus::Result<String>;

    async fn cancel_session(
        &self,
        course_id: &str,
        date: &str,
        caller_id: &str,
        caller_role: &str,
    ) -> zbus::Result<u32>;

    async fn select_courses(
        &self,
        student_id: &str,
        course_ids: &str,
        caller_id: &str,
        caller_role: &str,
    ) -> zbus::Result<String>;

    async fn review_enrollment(
        &self,
        enrollment_id: &str,
        approve: bool,
        caller_id: &str,
        caller_role: &str,
    ) -> zbus::Result<String>;

    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    /// Caller identity (uuid), forwarded to the daemon
    #[arg(long, global = true)]
    caller: Option<String>,
    /// Caller role: student or academician
    #[arg(long, global = true, default_value = "student")]
    role: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify yourself for a course and record attendance
    Identify {
        /// Course id (uuid)
        course_id: String,
        /// Path to a JSON file holding the probe embedding ([f32, ...])
        probe_file: String,
    },
    /// Mark a group photo's worth of probes for your course
    BatchIdentify {
        /// Course id (uuid)
        course_id: String,
        /// Path to a JSON file holding probe embeddings ([[f32, ...], ...])
        probes_file: String,
    },
    /// Cancel a course's session for a date
    Cancel {
        /// Course id (uuid)
        course_id: String,
        /// Session date, YYYY-MM-DD
        date: String,
    },
    /// Select courses for a student (pending approval)
    Select {
        /// Student id (uuid)
        student_id: String,
        /// Course ids (uuids)
        course_ids: Vec<String>,
    },
    /// Approve or reject a pending enrollment
    Review {
        /// Enrollment id (uuid)
        enrollment_id: String,
        /// Reject instead of approve
        #[arg(long)]
        reject: bool,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let connection = zbus::Connection::session()
        .await
        .context("connecting to session bus")?;
    let proxy = AttendanceProxy::new(&connection)
        .await
        .context("connecting to rollcalld")?;

    let caller = cli.caller.unwrap_or_default();
    match cli.command {
        Commands::Identify {
            course_id,
            probe_file,
        } => {
            let probe = std::fs::read_to_string(&probe_file)
                .with_context(|| format!("reading probe file {probe_file}"))?;
            let response = proxy
                .identify(&course_id, &caller, &cli.role, probe.trim())
                .await?;
            println!("{response}");
        }
        Commands::BatchIdentify {
            course_id,
            probes_file,
        } => {
            let probes = std::fs::read_to_string(&probes_file)
                .with_context(|| format!("reading probes file {probes_file}"))?;
            let response = proxy
                .batch_identify(&course_id, &caller, &cli.role, probes.trim())
                .await?;
            println!("{response}");
        }
        Commands::Cancel { course_id, date } => {
            let cancelled = proxy
                .cancel_session(&course_id, &date, &caller, &cli.role)
                .await?;
            println!("Cancelled for {cancelled} enrollees");
        }
        Commands::Select {
            student_id,
            course_ids,
        } => {
            let ids = serde_json::to_string(&course_ids)?;
            let created = proxy
                .select_courses(&student_id, &ids, &caller, &cli.role)
                .await?;
            println!("{created}");
        }
        Commands::Review {
            enrollment_id,
            reject,
        } => {
            let reviewed = proxy
                .review_enrollment(&enrollment_id, !reject, &caller, &cli.role)
                .await?;
            println!("{reviewed}");
        }
        Commands::Status => {
            let status = proxy.status().await?;
            println!("{status}");
        }
    }

    Ok(())
}
