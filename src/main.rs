use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use salesdash::charts::{self, ChartKind};
use salesdash::dashboard::Dashboard;
use salesdash::data::{LoadOptions, NumericPolicy};
use salesdash::filter::{session, Dropdown, FilterField, ALL};
use salesdash::graph::render_scene;
use salesdash::tooltip::Tooltip;
use salesdash::{OutputFormat, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "salesdash")]
#[command(author, version, about = "Filterable car sales dashboard rendered to PNG/SVG", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the bar, trend and parallel charts for one selection
    Render {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the filter dropdowns
    Options {
        #[command(flatten)]
        data: DataArgs,
        /// Make used to narrow the body type list
        #[arg(long, default_value = ALL)]
        make: String,
    },
    /// Print all three aggregations as JSON
    Export {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Line-driven session over stdin; every change re-renders the charts
    Interactive {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Car sales CSV file
    #[arg(value_hint = ValueHint::FilePath)]
    data: PathBuf,

    /// Reject rows with unparseable numbers instead of keeping them as NaN
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,
}

impl DataArgs {
    fn load(&self) -> Dashboard {
        let numeric = if self.strict {
            NumericPolicy::Strict
        } else {
            NumericPolicy::Permissive
        };
        let mut dashboard = Dashboard::new();
        dashboard.load(&self.data, LoadOptions { numeric });
        dashboard
    }
}

#[derive(Args, Debug)]
struct SelectionArgs {
    #[arg(long, default_value = ALL)]
    make: String,
    #[arg(long, default_value = ALL)]
    body: String,
    #[arg(long, default_value = ALL)]
    state: String,
}

impl SelectionArgs {
    /// Apply through the control panel so the body cascade still runs.
    fn apply(&self, dashboard: &mut Dashboard) {
        dashboard.choose(FilterField::Make, &self.make);
        dashboard.choose(FilterField::Body, &self.body);
        dashboard.choose(FilterField::State, &self.state);
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Directory receiving bar/trend/parallel images
    #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
    out: PathBuf,

    /// png or svg
    #[arg(long, default_value = "png")]
    format: OutputFormat,

    /// Pixel scale factor, above 0 and at most 10
    #[arg(long, default_value_t = 1.0, value_parser = parse_scale)]
    scale: f64,
}

const MAX_SCALE: f64 = 10.0;

fn parse_scale(raw: &str) -> Result<f64, String> {
    let scale: f64 = raw.parse().map_err(|_| format!("'{}' is not a number", raw))?;
    if scale > 0.0 && scale <= MAX_SCALE {
        Ok(scale)
    } else {
        Err(format!("scale must be above 0 and at most {}", MAX_SCALE))
    }
}

impl OutputArgs {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format,
            scale: self.scale,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Render { data, selection, output } => handle_render(data, selection, output),
        Command::Options { data, make } => handle_options(data, &make),
        Command::Export { data, selection } => handle_export(data, selection),
        Command::Interactive { data, output } => handle_interactive(data, output),
    }
}

fn handle_render(data: DataArgs, selection: SelectionArgs, output: OutputArgs) -> Result<()> {
    let mut dashboard = data.load();
    selection.apply(&mut dashboard);
    let written = dashboard
        .render_all(&output.out, &output.render_options())
        .context("Failed to render dashboard")?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn handle_options(data: DataArgs, make: &str) -> Result<()> {
    let mut dashboard = data.load();
    dashboard.choose(FilterField::Make, make);
    print_dropdowns(&dashboard.dropdowns());
    Ok(())
}

fn handle_export(data: DataArgs, selection: SelectionArgs) -> Result<()> {
    let mut dashboard = data.load();
    selection.apply(&mut dashboard);
    let aggregates = dashboard.aggregates();
    let json = serde_json::to_string_pretty(&*aggregates).context("Failed to serialize aggregations")?;
    println!("{}", json);
    Ok(())
}

fn print_dropdowns(dropdowns: &[Dropdown]) {
    for dropdown in dropdowns {
        println!("{} [{}]: {}", dropdown.label, dropdown.value, dropdown.options.join(", "));
    }
}

/// Tooltip pinned to the chart it was opened on.
struct Hover {
    chart: ChartKind,
    tooltip: Tooltip,
}

fn handle_interactive(data: DataArgs, output: OutputArgs) -> Result<()> {
    let mut dashboard = data.load();
    let options = output.render_options();
    let _session = dashboard.session();

    let dirty = Rc::new(Cell::new(false));
    let flag = Rc::clone(&dirty);
    session::use_filter_store()?
        .borrow_mut()
        .subscribe(move |_| flag.set(true));

    let mut hover: Option<Hover> = None;
    render(&mut dashboard, &output.out, &options, hover.as_ref())?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };

        match run_command(command, args, &mut dashboard, &mut hover) {
            Ok(Step::Quit) => break,
            Ok(Step::Render) => render(&mut dashboard, &output.out, &options, hover.as_ref())?,
            Ok(Step::Continue) => {}
            Err(e) => eprintln!("error: {:#}", e),
        }

        // a new selection rebuilds every scene, so old hover regions are gone
        if dirty.replace(false) {
            hover = None;
            render(&mut dashboard, &output.out, &options, None)?;
        }
        stdout.flush().context("Failed to flush stdout")?;
    }
    Ok(())
}

enum Step {
    Continue,
    Render,
    Quit,
}

fn run_command(command: &str, args: &[&str], dashboard: &mut Dashboard, hover: &mut Option<Hover>) -> Result<Step> {
    match command {
        "make" | "body" | "state" => {
            let field: FilterField = command.parse()?;
            let value = if args.is_empty() { ALL.to_string() } else { args.join(" ") };
            if !dashboard.choose(field, &value) {
                println!("{} unchanged", field.label());
            }
        }
        "reset" => {
            dashboard.reset();
        }
        "options" => {
            let store = session::use_filter_store()?;
            let selection = store.borrow().selection().clone();
            print_dropdowns(&dashboard.panel().dropdowns(&selection));
        }
        "hover" => {
            let [chart, x, y] = args else {
                bail!("usage: hover <bar|trend|parallel> X Y");
            };
            let chart: ChartKind = chart.parse()?;
            let (x, y) = (parse_coord(x)?, parse_coord(y)?);
            let scene = dashboard.scene(chart);
            let mut tooltip = Tooltip::new();
            if tooltip.pointer_over(&scene, x, y) {
                println!("{}", tooltip.text());
                *hover = Some(Hover { chart, tooltip });
            } else {
                println!("nothing under pointer");
                *hover = None;
            }
        }
        "move" => {
            let [x, y] = args else {
                bail!("usage: move X Y");
            };
            let (x, y) = (parse_coord(x)?, parse_coord(y)?);
            match hover.as_mut() {
                Some(h) => {
                    h.tooltip.pointer_move(x, y);
                    if let Some((tx, ty)) = h.tooltip.position() {
                        println!("tooltip at {:.0},{:.0}", tx, ty);
                    }
                }
                None => println!("no tooltip"),
            }
        }
        "out" => {
            if let Some(h) = hover.as_mut() {
                h.tooltip.pointer_out();
            }
            *hover = None;
        }
        "render" => return Ok(Step::Render),
        "quit" | "exit" => return Ok(Step::Quit),
        other => bail!("unknown command '{}'", other),
    }
    Ok(Step::Continue)
}

fn parse_coord(raw: &str) -> Result<f64> {
    raw.parse().with_context(|| format!("'{}' is not a coordinate", raw))
}

fn render(dashboard: &mut Dashboard, out: &Path, options: &RenderOptions, hover: Option<&Hover>) -> Result<()> {
    dashboard.render_all(out, options)?;

    if let Some(hover) = hover.filter(|h| h.tooltip.is_visible()) {
        let mut scene = charts::build(hover.chart, &dashboard.aggregates());
        hover.tooltip.overlay(&mut scene);
        let bytes = render_scene(&scene, options)?;
        let path = out.join(format!("{}.{}", hover.chart.file_stem(), options.format.extension()));
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(chart = %hover.chart, "drew tooltip overlay");
    }
    Ok(())
}
