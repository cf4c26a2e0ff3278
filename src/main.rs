use clap::{Parser, Subcommand};
use concerto_rs::{
    ConcertoError, DeclarationKind, Factory, GenerationMode, InstanceOptions, ModelManager,
    Serializer,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "concerto")]
#[command(about = "A CLI tool for validating Concerto model ASTs and generating sample instances")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate Concerto model AST JSON files
    Validate {
        /// Input JSON files to validate, added in dependency order
        #[arg(short, long, value_name = "FILE")]
        input: Vec<PathBuf>,

        /// Stop validation at the first error
        #[arg(long)]
        fail_early: bool,
    },
    /// Generate a sample instance of a type declared by the input models
    Sample {
        /// Input model AST JSON files
        #[arg(short, long, value_name = "FILE")]
        input: Vec<PathBuf>,

        /// Fully qualified name of the type to generate
        #[arg(short, long, value_name = "FQN")]
        type_name: String,

        /// Also generate optional fields
        #[arg(long)]
        include_optional: bool,
    },
}

#[derive(Debug)]
struct ValidationReport {
    total_files: usize,
    successful: usize,
    failed: usize,
    errors: Vec<(PathBuf, ConcertoError)>,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            total_files: 0,
            successful: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    fn add_success(&mut self) {
        self.total_files += 1;
        self.successful += 1;
    }

    fn add_error(&mut self, file: PathBuf, error: ConcertoError) {
        self.total_files += 1;
        self.failed += 1;
        self.errors.push((file, error));
    }

    fn print_summary(&self) {
        println!("\n=== Validation Report ===");
        println!("Total files processed: {}", self.total_files);
        println!("Successful validations: {}", self.successful);
        println!("Failed validations: {}", self.failed);

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for (file, error) in &self.errors {
                println!("  {}: {}", file.display(), error);
            }
        }

        if self.failed == 0 {
            println!("\n✅ All validations passed!");
        } else {
            println!("\n❌ {} validation(s) failed", self.failed);
        }
    }

    fn has_errors(&self) -> bool {
        self.failed > 0
    }
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Validate { input, fail_early } => handle_validate_command(input, fail_early),
        Commands::Sample {
            input,
            type_name,
            include_optional,
        } => handle_sample_command(input, &type_name, include_optional),
    };

    std::process::exit(exit_code);
}

fn handle_validate_command(input_files: Vec<PathBuf>, fail_early: bool) -> i32 {
    if input_files.is_empty() {
        eprintln!(
            "Error: No input files specified. Use --input to specify JSON files to validate."
        );
        return 1;
    }

    let mut manager = match ModelManager::new() {
        Ok(manager) => manager,
        Err(error) => {
            eprintln!("Error: failed to initialize the model manager: {}", error);
            return 1;
        }
    };

    let mut report = ValidationReport::new();

    for file_path in input_files {
        match validate_file(&mut manager, &file_path) {
            Ok(()) => {
                println!("✅ {}: Valid", file_path.display());
                report.add_success();
            }
            Err(error) => {
                println!("❌ {}: {}", file_path.display(), error);
                report.add_error(file_path, error);

                if fail_early {
                    println!("\nStopping validation due to --fail-early flag.");
                    break;
                }
            }
        }
    }

    if !fail_early {
        report.print_summary();
    }

    if report.has_errors() {
        1
    } else {
        0
    }
}

fn validate_file(manager: &mut ModelManager, file_path: &PathBuf) -> Result<(), ConcertoError> {
    let content = fs::read_to_string(file_path).map_err(ConcertoError::Io)?;
    manager.add_model_json(&content)
}

fn handle_sample_command(input_files: Vec<PathBuf>, type_name: &str, include_optional: bool) -> i32 {
    if input_files.is_empty() {
        eprintln!("Error: No input files specified. Use --input to specify model JSON files.");
        return 1;
    }

    let mut manager = match ModelManager::new() {
        Ok(manager) => manager,
        Err(error) => {
            eprintln!("Error: failed to initialize the model manager: {}", error);
            return 1;
        }
    };
    for file_path in &input_files {
        if let Err(error) = validate_file(&mut manager, file_path) {
            eprintln!("❌ {}: {}", file_path.display(), error);
            return 1;
        }
    }

    match generate_sample(&manager, type_name, include_optional) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(error) => {
            eprintln!("❌ {}: {}", type_name, error);
            1
        }
    }
}

fn generate_sample(
    manager: &ModelManager,
    type_name: &str,
    include_optional: bool,
) -> Result<String, ConcertoError> {
    let declaration = manager.get_type(type_name)?;
    let namespace = declaration.namespace().to_string();
    let short_name = declaration.name().to_string();

    let options = InstanceOptions {
        generate: Some(GenerationMode::Sample),
        include_optional_fields: include_optional,
        ..InstanceOptions::default()
    };
    let factory = Factory::new(manager);
    let instance = match declaration.kind() {
        DeclarationKind::Concept => factory.new_concept(&namespace, &short_name, &options)?,
        DeclarationKind::Transaction => {
            factory.new_transaction(&namespace, &short_name, None, &options)?
        }
        DeclarationKind::Event => factory.new_event(&namespace, &short_name, None, &options)?,
        DeclarationKind::Asset | DeclarationKind::Participant => {
            factory.new_resource(&namespace, &short_name, None, &options)?
        }
        DeclarationKind::Enum => {
            return Err(ConcertoError::model_violation(format!(
                "{} is an enum, not an instantiable type",
                type_name
            )))
        }
    };

    let serializer = Serializer::new(manager);
    let json = serializer.to_json(&instance, None)?;
    serde_json::to_string_pretty(&json).map_err(ConcertoError::Json)
}
