//! Offline control-plane tracing.
//!
//! Provides the `sdntrace` binary, which runs the same engine as the HTTP
//! server against a snapshot file instead of live collaborators. A snapshot
//! holds the installed flows and the topology:
//!
//! ```json
//! {"flows": {"<dpid>": [...]}, "topology": {"switches": [...], "links": [...]}}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use sdntrace_core::circuit::asymmetric_circuits;
use sdntrace_core::{
    discover_circuits, render_hops, Circuit, FlowTables, HopView, TopologySnapshot, TraceError,
    TraceRequest, TraceResult, TraceWalker,
};

/// SDN control-plane trace tools.
#[derive(Parser)]
#[command(name = "sdntrace", about = "SDN control-plane trace tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace one request through the snapshot.
    Trace {
        /// Path to the snapshot file.
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Trace request as JSON, e.g. '{"trace": {"switch": {"dpid": "...", "in_port": 1}}}'.
        request: String,
    },
    /// Trace every request of a JSON array file.
    Traces {
        /// Path to the snapshot file.
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Path to a file holding a JSON array of trace requests.
        #[arg(short, long)]
        requests: PathBuf,
    },
    /// Discover the circuits implied by the installed flows.
    Circuits {
        /// Path to the snapshot file.
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Only print circuits without a symmetric return circuit.
        #[arg(long)]
        asymmetric: bool,
    },
}

/// Exit codes: 0 = success, 1 = trace error, 2 = output error,
/// 3 = I/O or parse error.
const EXIT_TRACE: i32 = 1;
const EXIT_OUTPUT: i32 = 2;
const EXIT_IO: i32 = 3;

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    flows: FlowTables,
    #[serde(default)]
    topology: TopologySnapshot,
}

#[derive(Serialize)]
struct ResultOutput<T> {
    result: T,
}

#[derive(Serialize)]
struct CircuitsOutput<'a> {
    circuits: Vec<&'a Circuit>,
    total: usize,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Trace { snapshot, request } => run_trace(&snapshot, &request),
        Commands::Traces { snapshot, requests } => run_traces(&snapshot, &requests),
        Commands::Circuits {
            snapshot,
            asymmetric,
        } => run_circuits(&snapshot, asymmetric),
    };
    process::exit(exit_code);
}

fn load_snapshot(path: &Path) -> Result<Snapshot, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read snapshot '{}': {}", path.display(), e))?;
    parse_snapshot(&text).map_err(|e| format!("invalid snapshot '{}': {}", path.display(), e))
}

fn parse_snapshot(text: &str) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_str(text)
}

/// Prints `value` as pretty JSON and returns the exit code.
fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            EXIT_OUTPUT
        }
    }
}

fn trace_one(snapshot: &Snapshot, body: Value) -> Result<TraceResult, TraceError> {
    let request = TraceRequest::from_value(body)?;
    let fields = request.to_fields()?;
    let walker = TraceWalker::new(&snapshot.topology, &snapshot.flows);
    walker.tracepath(fields)
}

fn run_trace(snapshot_path: &Path, request: &str) -> i32 {
    let snapshot = match load_snapshot(snapshot_path) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_IO;
        }
    };
    let body: Value = match serde_json::from_str(request) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: request is not JSON: {}", e);
            return EXIT_IO;
        }
    };

    match trace_one(&snapshot, body) {
        Ok(result) => print_json(&ResultOutput {
            result: render_hops(&result),
        }),
        Err(e) => {
            eprintln!("Trace error: {}", e);
            EXIT_TRACE
        }
    }
}

fn run_traces(snapshot_path: &Path, requests_path: &Path) -> i32 {
    let snapshot = match load_snapshot(snapshot_path) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_IO;
        }
    };
    let bodies: Vec<Value> = match fs::read_to_string(requests_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(b) => b,
        Err(e) => {
            eprintln!(
                "Error: failed to load requests '{}': {}",
                requests_path.display(),
                e
            );
            return EXIT_IO;
        }
    };

    let mut results: Vec<TraceResult> = Vec::with_capacity(bodies.len());
    for body in bodies {
        match trace_one(&snapshot, body) {
            Ok(result) => results.push(result),
            Err(e @ TraceError::PipelineRegression { .. }) => {
                eprintln!("Trace error: {}", e);
                return EXIT_TRACE;
            }
            // Malformed entries yield an empty result, as on the server.
            Err(_) => results.push(Vec::new()),
        }
    }
    let rendered: Vec<Vec<HopView<'_>>> = results.iter().map(|r| render_hops(r)).collect();
    print_json(&ResultOutput { result: rendered })
}

fn run_circuits(snapshot_path: &Path, only_asymmetric: bool) -> i32 {
    let snapshot = match load_snapshot(snapshot_path) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_IO;
        }
    };

    let discovery = discover_circuits(&snapshot.flows, &snapshot.topology);
    for failed in &discovery.failed {
        eprintln!("Warning: could not trace seed: {}", failed.error);
    }

    let circuits = if only_asymmetric {
        asymmetric_circuits(&discovery.circuits)
    } else {
        discovery.circuits.iter().collect()
    };
    print_json(&CircuitsOutput {
        total: circuits.len(),
        circuits,
    })
}
