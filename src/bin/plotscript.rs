use clap::{Arg, ArgAction, ArgMatches, Command};
use plotscript::{DEFAULT_STARTUP, Error};
use plotscript::consumer::{ControlToken, Kernel, KernelConfig, startup_failure};
use plotscript::environment::Binding;
use plotscript::expression::Expression;
use plotscript::interpreter::Interpreter;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::{fs, panic, process, thread};

const INVALID_PROGRAM: &str = "Error: Invalid Program. Could not parse.";

fn cli() -> Command {
    let command = Command::new("plotscript")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evaluate plotscript programs, or start an interactive session")
        .arg(Arg::new("FILE").help("Program file to evaluate"))
        .arg(
            Arg::new("expression")
                .short('e')
                .long("expression")
                .value_name("PROGRAM")
                .conflicts_with("FILE")
                .help("Evaluate PROGRAM and print the result"),
        )
        .arg(
            Arg::new("startup")
                .long("startup")
                .value_name("FILE")
                .help("Evaluate FILE instead of the built-in startup program"),
        )
        .arg(
            Arg::new("no-startup")
                .long("no-startup")
                .action(ArgAction::SetTrue)
                .conflicts_with("startup")
                .help("Start with only the built-in procedures"),
        );

    #[cfg(feature = "scene")]
    let command = command.arg(
        Arg::new("scene")
            .long("scene")
            .action(ArgAction::SetTrue)
            .help("Print results as JSON render primitives"),
    );

    command
}

fn main() {
    env_logger::init();
    let matches = cli().get_matches();

    let startup = startup_program(&matches);
    let scene = scene_requested(&matches);

    let program = if let Some(program) = matches.get_one::<String>("expression") {
        Some(program.clone())
    } else if let Some(path) = matches.get_one::<String>("FILE") {
        match fs::read_to_string(path) {
            Ok(program) => Some(program),
            Err(err) => {
                eprintln!("Error: Could not open file {path}: {err}");
                process::exit(1);
            }
        }
    } else {
        None
    };

    if let Some(program) = program {
        process::exit(run_batch(program, startup, scene));
    }

    let result = panic::catch_unwind(|| {
        run_repl(startup, scene);
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Startup program text, or the error result reported when the startup file can't be read
type StartupSource = Result<Option<String>, Expression>;

fn startup_program(matches: &ArgMatches) -> StartupSource {
    if matches.get_flag("no-startup") {
        return Ok(None);
    }
    match matches.get_one::<String>("startup") {
        Some(path) => fs::read_to_string(path).map(Some).map_err(|err| {
            Expression::error(format!("Error: Invalid Startup. Could not open {path}: {err}"))
        }),
        None => Ok(Some(DEFAULT_STARTUP.to_owned())),
    }
}

#[cfg(feature = "scene")]
fn scene_requested(matches: &ArgMatches) -> bool {
    matches.get_flag("scene")
}

#[cfg(not(feature = "scene"))]
fn scene_requested(_matches: &ArgMatches) -> bool {
    false
}

/// Text printed for a result
#[cfg_attr(not(feature = "scene"), expect(unused_variables))]
fn render(result: &Expression, scene: bool) -> String {
    #[cfg(feature = "scene")]
    if scene && !result.head().is_error() {
        return plotscript::scene::to_json(result).unwrap_or_else(|err| err.to_string());
    }
    result.to_string()
}

/// What a batch run prints
#[derive(Debug, PartialEq)]
struct BatchOutput {
    /// Startup failures, printed before the result
    startup_errors: Vec<String>,
    /// Rendered result, or the error that ended the program
    result: Result<String, String>,
}

/// Run the startup program, then evaluate `program`.
///
/// A startup that fails is reported and the program is still evaluated, with whatever
/// definitions the startup made before failing.
fn evaluate_batch(program: &str, startup: StartupSource, scene: bool) -> BatchOutput {
    let mut interpreter = Interpreter::new();
    let mut startup_errors = Vec::new();
    match startup {
        Ok(Some(startup)) => {
            if let Err(err) = interpreter.run_startup(&startup) {
                startup_errors.push(startup_failure(&err).to_string());
            }
        }
        Ok(None) => {}
        Err(failure) => startup_errors.push(failure.to_string()),
    }

    let result = match interpreter.parse_str(program) {
        Err(err) => {
            log::debug!("program did not parse: {}", err.message);
            Err(INVALID_PROGRAM.to_owned())
        }
        Ok(()) => interpreter
            .evaluate()
            .map(|result| render(&result, scene))
            .map_err(|err| err.to_string()),
    };

    BatchOutput {
        startup_errors,
        result,
    }
}

/// Evaluate one program and return the process exit code
fn run_batch(program: String, startup: StartupSource, scene: bool) -> i32 {
    // Deep recursion needs more stack than the main thread has
    let worker = thread::Builder::new()
        .name("plotscript-batch".to_owned())
        .stack_size(KernelConfig::default().stack_size)
        .spawn(move || {
            let output = evaluate_batch(&program, startup, scene);
            for failure in &output.startup_errors {
                eprintln!("{failure}");
            }
            match output.result {
                Ok(result) => {
                    println!("{result}");
                    0
                }
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            }
        });

    match worker.map(thread::JoinHandle::join) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => 1,
        Err(err) => {
            eprintln!("Error: could not start evaluation: {err}");
            1
        }
    }
}

fn run_repl(startup: StartupSource, scene: bool) {
    #[cfg_attr(not(feature = "scene"), expect(unused_mut))]
    let mut scene = scene;

    println!("Plotscript Interpreter");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };

    let startup = startup.unwrap_or_else(|failure| {
        println!("{failure}");
        None
    });
    let mut kernel = Kernel::new(KernelConfig {
        startup,
        ..KernelConfig::default()
    });

    // Ctrl+C at the prompt is handled by the line editor; during an evaluation it
    // arrives as a signal and cancels the evaluation
    let interrupt = kernel.interrupt_handle();
    if let Err(err) = ctrlc::set_handler(move || interrupt.raise()) {
        log::warn!("could not install Ctrl+C handler: {err}");
    }

    let outcome = kernel.start();
    report(&kernel, outcome);

    loop {
        match rl.readline("plotscript> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&mut kernel);
                        continue;
                    }
                    #[cfg(feature = "scene")]
                    ":scene" => {
                        scene = !scene;
                        if scene {
                            println!("Scene mode enabled: results shown as JSON render primitives");
                        } else {
                            println!("Scene mode disabled: results shown as expressions");
                        }
                        continue;
                    }
                    ":quit" | ":exit" => break,
                    _ => {}
                }

                if let Some(token) = ControlToken::parse(line) {
                    let outcome = match token {
                        ControlToken::Start => kernel.start(),
                        ControlToken::Stop => kernel.stop(),
                        ControlToken::Reset => kernel.reset(),
                        ControlToken::Exit => break,
                    };
                    report(&kernel, outcome);
                    continue;
                }

                // A cancel request only applies to the submission it interrupted
                kernel.clear_interrupt();
                if let Err(err) = kernel.submit(line) {
                    println!("{err}");
                    continue;
                }
                let result = kernel.recv();
                kernel.clear_interrupt();
                println!("{}", render(&result, scene));
            }

            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Print the outcome of a control command and any startup failure it queued
fn report(kernel: &Kernel, outcome: Result<(), Error>) {
    if let Err(err) = outcome {
        println!("{err}");
    }
    while let Some(result) = kernel.try_recv() {
        println!("{result}");
    }
}

fn print_help() {
    println!("Plotscript Interpreter:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    #[cfg(feature = "scene")]
    println!("  :scene     - Toggle JSON render primitive output");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Interrupt a running evaluation");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Kernel control:");
    println!("  %start     - Start the interpreter kernel");
    println!("  %stop      - Stop the kernel, keeping its definitions");
    println!("  %reset     - Restart the kernel with a fresh environment");
    println!("  %exit      - Exit the interpreter");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 I)");
    println!("  (begin (define f (lambda (x) (* x x))) (map f (range 0 5 1)))");
    println!("  (get-property \"note\" (set-property \"note\" \"hi\" (1)))");
    println!("  (discrete-plot (list (list 0 1) (list 1 2)) (list (list \"title\" \"demo\")))");
    println!();
}

fn print_environment(kernel: &mut Kernel) {
    let interpreter = match kernel.snapshot() {
        Ok(Some(interpreter)) => interpreter,
        Ok(None) => {
            println!("Environment is empty.");
            return;
        }
        Err(err) => {
            println!("{err}");
            return;
        }
    };
    // Results of submissions evaluated before the snapshot
    while let Some(result) = kernel.try_recv() {
        println!("{result}");
    }

    let bindings = interpreter.env().get_all_bindings();
    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, binding) in bindings {
        match binding {
            Binding::Procedure(_) => builtins.push(name),
            Binding::Value(value) => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("Values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
