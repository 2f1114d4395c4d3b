//! Print the outcome of a monitoring run, either the verdict alone or a full
//! report with monitor statistics.

use crate::evaluation::{MonitorStats, Verdict};

use std::io::Write;
use std::time::SystemTime;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrintOptions {
    NoPrint,
    ShortPrint,
    FullPrint,
}

fn verdict_color(verdict: Verdict) -> Color {
    match verdict {
        Verdict::True => Color::Green,
        Verdict::False => Color::Red,
        Verdict::Unknown => Color::Yellow,
    }
}

/// Print the verdict, colored by its value. Does nothing for `NoPrint`.
pub fn print_verdict(verdict: Verdict, print_options: PrintOptions) {
    if print_options == PrintOptions::NoPrint {
        return;
    }
    let mut stdout = StandardStream::stdout(ColorChoice::Always);
    write!(&mut stdout, "Verdict: ").unwrap();
    stdout
        .set_color(ColorSpec::new().set_fg(Some(verdict_color(verdict))))
        .unwrap();
    writeln!(&mut stdout, "{verdict}").unwrap();
    stdout.reset().unwrap();
}

/// Print the verdict and, for the full option, the statistics of the run.
pub fn print_monitor_report(
    verdict: Verdict,
    stats: &MonitorStats,
    start_time: SystemTime,
    print_options: PrintOptions,
) {
    print_verdict(verdict, print_options);
    if print_options != PrintOptions::FullPrint {
        return;
    }
    println!(
        "Time to obtain the verdict: {}ms",
        start_time.elapsed().unwrap().as_millis()
    );
    println!("{} instances created", stats.num_instances);
    println!("{} atom monitors created", stats.num_atom_monitors);
    println!("{} monitor steps", stats.num_steps);
    println!("-----");
}
