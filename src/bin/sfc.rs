// ABOUTME: Thin demonstration CLI: scan -> parse -> decorate -> check, then print results

use clap::Parser;
use scheme_frontend::compile::Compilation;
use scheme_frontend::options::CompileOptions;
use std::fs;
use std::process::ExitCode;

/// Runs the frontend pipeline over one or more source files and prints
/// either the collected diagnostics or a debug dump of the decorated AST.
/// This binary is wiring around the in-scope pipeline (scan, parse,
/// decorate, check); it never evaluates or generates code.
#[derive(Parser, Debug)]
#[command(name = "sfc", about = "Scheme-dialect frontend: scan, parse, and decorate source files")]
struct CliArgs {
    /// Source files to compile, in order.
    sources: Vec<String>,

    /// Print a debug dump of the decorated AST instead of just diagnostics.
    #[arg(long)]
    dump_ast: bool,

    /// Print diagnostics as a JSON array instead of one line per diagnostic.
    #[arg(long)]
    json: bool,

    /// Disallow top-level redefinition of an existing name.
    #[arg(long)]
    disallow_redefinition: bool,

    /// Enable optimistic inlining of arithmetic builtins.
    #[arg(long)]
    optimistic_inlining: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    let options = CompileOptions {
        allow_redefinition: !args.disallow_redefinition,
        optimistic_inlining: args.optimistic_inlining,
        ..CompileOptions::default()
    };
    let compilation = Compilation::new(options);

    let mut had_errors = false;
    for path in &args.sources {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{path}: {e}");
                had_errors = true;
                continue;
            }
        };
        let result = compilation.compile_source(&source, path);
        if result.has_errors() {
            had_errors = true;
        }
        if args.json {
            match result.diagnostics.to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("{path}: failed to render diagnostics as JSON: {e}"),
            }
        } else {
            for diagnostic in result.diagnostics.iter() {
                println!("{diagnostic}");
            }
        }
        if args.dump_ast {
            for &node in &result.program {
                println!("{:#?}", result.ast.get(node));
            }
        }
    }

    if had_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
