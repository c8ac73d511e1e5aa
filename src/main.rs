use clap::{Arg, Command};
use std::error::Error;
use std::path::Path;

use syncmesh::logging;
use syncmesh::recovery::RecoveryPlan;
use syncmesh::registry::Registry;
use syncmesh::SyncEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = Command::new("SyncMesh")
		.version("0.2.0")
		.about("Multi-path directory sync engine")
		.subcommand_required(true)
		.subcommand(
			Command::new("check")
				.about("Validate a configuration document and optional recovery plan")
				.arg(
					Arg::new("config")
						.short('c')
						.long("config")
						.value_name("FILE")
						.required(true)
						.help("Sync registry configuration (YAML)"),
				)
				.arg(
					Arg::new("recovery-plan")
						.long("recovery-plan")
						.value_name("FILE")
						.help("Recovery plan document (YAML)"),
				),
		)
		.subcommand(
			Command::new("run")
				.about("Run the sync engine until interrupted")
				.arg(
					Arg::new("config")
						.short('c')
						.long("config")
						.value_name("FILE")
						.required(true)
						.help("Sync registry configuration (YAML)"),
				)
				.arg(
					Arg::new("recovery-plan")
						.long("recovery-plan")
						.value_name("FILE")
						.help("Recovery plan document (YAML)"),
				),
		)
		.get_matches();

	if let Some(matches) = matches.subcommand_matches("check") {
		let config = matches.get_one::<String>("config").ok_or("check: config required")?;
		let registry = Registry::load(Path::new(config))?;
		println!(
			"Configuration OK: project {} with {} path rule(s)",
			registry.project_id(),
			registry.path_rules().len()
		);

		if let Some(plan_path) = matches.get_one::<String>("recovery-plan") {
			let plan = RecoveryPlan::load(Path::new(plan_path))?;
			println!("Recovery plan OK: {} phase(s)", plan.phases.len());
		}
		return Ok(());
	}

	if let Some(matches) = matches.subcommand_matches("run") {
		let config = matches.get_one::<String>("config").ok_or("run: config required")?;
		let registry = Registry::load(Path::new(config))?;

		let plan = match matches.get_one::<String>("recovery-plan") {
			Some(plan_path) => RecoveryPlan::load(Path::new(plan_path))?,
			None => RecoveryPlan::default_plan(),
		};

		let mut engine = SyncEngine::builder().registry(registry).recovery_plan(plan).build()?;
		engine.initialize().await?;

		tokio::signal::ctrl_c().await?;
		engine.shutdown().await?;

		let metrics = engine.get_metrics();
		eprintln!(
			"Synced {} change(s), ran {} recovery attempt(s)",
			metrics.syncs.len(),
			metrics.recoveries.len()
		);
		return Ok(());
	}

	Ok(())
}

// vim: ts=4
