mod app;
mod scene;

use anyhow::Result;
use onac_experiment::{ExperimentConfig, ExperimentDriver, SessionContext, TaskKind};

use crate::app::App;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(participant) = args.next() else {
        anyhow::bail!("usage: onac-app <participant-id> [serial-port]");
    };
    let port = args.next();

    let config = ExperimentConfig::default();
    let session = SessionContext::new(participant, port.as_deref(), config)?;
    session.write_manifest()?;

    let driver = ExperimentDriver::new(session, TaskKind::standard_sequence(), rand::rng());
    App::new(driver).run()
}
