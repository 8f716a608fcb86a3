use nemora::analysis;
use nemora::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "completion" {
        if let Err(e) = run_completion_demo() {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
        return;
    }
    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    if let Err(e) = run_formation_demo() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("nemora (neural assembly engine)");
    println!("usage:");
    println!("  cargo run                 assembly formation demo");
    println!("  cargo run -- completion   pattern completion demo");
    println!("  cargo run -- --help");
}

/// Repeatedly project a stimulus into a fresh area until its winner set
/// stabilizes: the classic assembly-formation run.
fn run_formation_demo() -> Result<(), BrainError> {
    let cfg = BrainConfig::new(0.05).with_seed(7).with_save_winners(true);
    let mut brain = Brain::new(cfg)?;
    brain.add_stimulus("stim", 317)?;
    brain.add_area("A", 100_000, 317, 0.05)?;

    println!("forming an assembly in A (n=100000, k=317, p=0.05, beta=0.05)");
    brain.project(&Projection::new().stimulus("stim", &["A"]))?;
    let proj = Projection::new().stimulus("stim", &["A"]).area("A", &["A"]);
    for round in 1..10 {
        brain.project(&proj)?;
        let a = brain.area("A")?;
        let history = a.saved_winners();
        let stable = analysis::overlap(&history[history.len() - 2], &history[history.len() - 1]);
        println!(
            "round {round:2}  w={:5}  first_winners={:3}  overlap_with_prev={stable}/{}",
            a.w(),
            a.num_first_winners(),
            a.k()
        );
    }

    // Let the assembly run on recurrence alone.
    let recurrent = Projection::new().area("A", &["A"]);
    for _ in 0..5 {
        brain.project(&recurrent)?;
    }
    let a = brain.area("A")?;
    println!(
        "after 5 recurrent-only rounds: w={} first_winners={}",
        a.w(),
        a.num_first_winners()
    );

    let diag = brain.diagnostics();
    println!(
        "graph: {} connectomes, {} synapses, max weight {:.2}, ~{} KiB",
        diag.connectomes,
        diag.synapses,
        diag.max_weight,
        diag.memory_bytes / 1024
    );
    Ok(())
}

/// Cue a stabilized assembly with half of its members and watch recurrence
/// restore the rest.
fn run_completion_demo() -> Result<(), BrainError> {
    let cfg = BrainConfig::new(0.05).with_seed(7);
    let mut brain = Brain::new(cfg)?;
    brain.add_stimulus("stim", 317)?;
    brain.add_area("A", 100_000, 317, 0.05)?;

    brain.project(&Projection::new().stimulus("stim", &["A"]))?;
    let proj = Projection::new().stimulus("stim", &["A"]).area("A", &["A"]);
    brain.project_rounds(&proj, 11)?;

    let assembly: Vec<NeuronId> = brain.area("A")?.winners().to_vec();
    let cue: Vec<NeuronId> = assembly.iter().step_by(2).copied().collect();
    println!(
        "cueing A with {}/{} assembly members",
        cue.len(),
        assembly.len()
    );
    brain.set_winners("A", &cue)?;

    let recurrent = Projection::new().area("A", &["A"]);
    for round in 1..=4 {
        brain.project(&recurrent)?;
        let restored = analysis::overlap(brain.area("A")?.winners(), &assembly);
        println!("round {round}  restored {restored}/{}", assembly.len());
    }
    Ok(())
}
