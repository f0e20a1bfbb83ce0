use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tessera::{
    BlurQuality, CancellationToken, CompositorConfig, ExecutionOutcome, ExecutionSystem,
    ImageInputs, MemoryBuffer, NodeTree, Rect,
};

#[derive(Parser, Debug)]
#[command(name = "tessera", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a node tree and write one output as a PNG.
    Render(RenderArgs),
    /// Print the execution groups a node tree is split into.
    Inspect(GraphArgs),
}

#[derive(Parser, Debug)]
struct GraphArgs {
    /// Node tree JSON.
    #[arg(long)]
    graph: PathBuf,

    /// Execution config JSON; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// External image as `name=path.png`; repeatable.
    #[arg(long = "input", value_parser = parse_input)]
    inputs: Vec<(String, PathBuf)>,

    /// Worker threads, overriding the config.
    #[arg(long)]
    threads: Option<usize>,

    /// Chunk edge length, overriding the config.
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Blur kernel policy, overriding the config.
    #[arg(long, value_enum)]
    blur: Option<BlurChoice>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    graph: GraphArgs,

    /// Output to write.
    #[arg(long, default_value = "primary")]
    output: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlurChoice {
    Fast,
    Quality,
}

fn parse_input(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=path, got '{s}'"))?;
    if name.is_empty() {
        return Err("input name must not be empty".into());
    }
    Ok((name.to_owned(), PathBuf::from(path)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn read_tree_json(path: &Path) -> anyhow::Result<NodeTree> {
    let f = File::open(path).with_context(|| format!("open node tree '{}'", path.display()))?;
    let tree: NodeTree =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse node tree JSON")?;
    Ok(tree)
}

fn read_config(args: &GraphArgs) -> anyhow::Result<CompositorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            CompositorConfig::from_json(&json).with_context(|| "parse config JSON")?
        }
        None => CompositorConfig::default(),
    };
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if let Some(n) = args.chunk_size {
        config.chunk_size = n;
    }
    if let Some(b) = args.blur {
        config.blur_quality = match b {
            BlurChoice::Fast => BlurQuality::Fast,
            BlurChoice::Quality => BlurQuality::Quality,
        };
    }
    config.validate()?;
    Ok(config)
}

fn load_png(path: &Path) -> anyhow::Result<MemoryBuffer> {
    let img = image::open(path)
        .with_context(|| format!("open image '{}'", path.display()))?
        .to_rgba32f();
    let (w, h) = img.dimensions();
    Ok(MemoryBuffer::from_pixels(
        Rect::from_origin_size(0, 0, w, h),
        img.into_raw(),
    )?)
}

fn load_inputs(args: &GraphArgs) -> anyhow::Result<ImageInputs> {
    let mut inputs = ImageInputs::new();
    for (name, path) in &args.inputs {
        let buf = load_png(path)?;
        inputs.insert(name.clone(), Arc::new(buf));
    }
    Ok(inputs)
}

fn build_system(args: &GraphArgs) -> anyhow::Result<ExecutionSystem> {
    let tree = read_tree_json(&args.graph)?;
    let config = read_config(args)?;
    let inputs = load_inputs(args)?;
    let system = ExecutionSystem::new(&tree, &inputs, config)?;
    for d in system.diagnostics() {
        eprintln!("warning: {d}");
    }
    Ok(system)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut system = build_system(&args.graph)?;
    let outcome = system.execute(&CancellationToken::new())?;
    let ExecutionOutcome::Completed(outputs) = outcome else {
        anyhow::bail!("execution was cancelled");
    };
    let buf = outputs.get(&args.output).with_context(|| {
        let names: Vec<&str> = outputs.names().collect();
        format!("no output named '{}' (have: {names:?})", args.output)
    })?;

    let bytes: Vec<u8> = buf
        .data()
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &bytes,
        buf.width(),
        buf.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    let stats = outputs.stats();
    eprintln!(
        "wrote {} ({} groups, {} chunks, {} skipped)",
        args.out.display(),
        stats.groups_executed,
        stats.chunks_evaluated,
        stats.chunks_skipped
    );
    Ok(())
}

fn cmd_inspect(args: GraphArgs) -> anyhow::Result<()> {
    let system = build_system(&args)?;
    let graph = system.graph();
    for group in system.groups() {
        let terminal = graph.operation(group.terminal());
        let res = group.resolution();
        println!(
            "group {}: {} -> op {} ({}), {}x{}, {} chunks",
            group.id().0,
            group.members().len(),
            group.terminal().0,
            terminal.name(),
            res.width,
            res.height,
            group.chunks().len()
        );
        for &op in group.members() {
            println!("  op {:>3} {}", op.0, graph.operation(op).name());
        }
    }
    Ok(())
}
