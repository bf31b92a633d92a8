//! Session status, resume, and reset commands.

use anyhow::Result;

use reportflow::config::Config;
use reportflow::orchestrator::WorkflowOrchestrator;
use reportflow::session::{SessionService, SessionState, SessionStore};

fn print_state(state: &SessionState) {
    let display = |value: &Option<String>| -> String {
        value.clone().unwrap_or_else(|| "-".to_string())
    };

    println!("Session {}", state.session_id);
    println!(
        "  engine:        {}",
        state
            .engine
            .map(|e| e.as_str().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    match &state.smartview_selection {
        Some(selection) => println!(
            "  scope:         {} ({} projects)",
            selection.smartview_name,
            selection.projects.len()
        ),
        None => println!("  scope:         -"),
    }
    println!("  template:      {}", display(&state.last_template_id));
    println!("  mapping:       {}", display(&state.last_mapping_id));
    println!("  fetched data:  {}", display(&state.last_fetched_data_id));
    println!(
        "  data ready:    {}",
        if state.has_fetched_data { "yes" } else { "no" }
    );
    println!("  last artifact: {}", display(&state.last_artifact_id));
}

pub fn cmd_status(config: &Config) -> Result<()> {
    let store = SessionStore::new(config.state_file.clone());
    let state = store.load();
    print_state(&state);
    println!();
    println!("State file: {}", config.state_file.display());
    Ok(())
}

pub async fn cmd_resume(config: &Config) -> Result<()> {
    let store = SessionStore::new(config.state_file.clone());
    let service = SessionService::new(config.backend_url.clone(), config.backend_key.clone());
    let mut orchestrator = WorkflowOrchestrator::new(store, service);

    let state = orchestrator.resume().await?;
    print_state(&state);
    println!();
    println!("Resumed at step: {}", orchestrator.current_step());
    Ok(())
}

pub fn cmd_reset(config: &Config, force: bool) -> Result<()> {
    use dialoguer::Confirm;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will start a new session. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let store = SessionStore::new(config.state_file.clone());
    let state = store.reset_session();
    println!("Started new session {}", state.session_id);
    if state.last_template_id.is_some() || state.last_mapping_id.is_some() {
        println!("Template and mapping references were carried over.");
    }
    Ok(())
}
