// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command line tracer: reads rays (one per line: `ox oy oz dx dy dz
//! tmin tmax`), traces them through the scene, and writes one radiance
//! triple per ray.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use ember_core::math::{Vec2, Vec3};
use ember_runtime::{Ray, RecordingDevice, Runtime, RuntimeOptions, Target};

#[derive(Parser)]
#[command(name = "igtrace", version, about = "Ember Command Line Tracer")]
struct Args {
    /// The scene file to trace against.
    scene: PathBuf,

    /// Samples per ray.
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    count: u32,

    /// Read the list of rays from a file instead of standard input.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Write radiance for each ray into a file instead of standard
    /// output.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Target platform (sse42, avx, avx2, avx512, asimd, nvvm, amdgpu,
    /// generic).
    #[arg(short = 't', long = "target")]
    target: Option<String>,

    /// Device to use on the selected platform.
    #[arg(short = 'd', long = "device", default_value_t = 0)]
    device: u32,

    /// Use the autodetected CPU target.
    #[arg(long = "cpu", conflicts_with = "gpu")]
    cpu: bool,

    /// Use the autodetected GPU target.
    #[arg(long = "gpu")]
    gpu: bool,

    /// Do not print messages into the console.
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,

    /// Print detailed information.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Do not use decorations to make console output better.
    #[arg(long = "no-color")]
    no_color: bool,
}

fn init_logger(args: &Args) {
    use env_logger::{Builder, Env};

    let default_level = if args.quiet {
        "off"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };

    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }
    builder.init();
}

fn pick_target(args: &Args) -> Result<Target> {
    if let Some(name) = &args.target {
        return Target::from_name(name)
            .with_context(|| format!("Unknown target '{name}'. Aborting."));
    }
    if args.gpu {
        // Pick the first GPU platform; the device index selects the card.
        return Ok(Target::Nvvm);
    }
    if args.cpu {
        return Ok(Target::Generic);
    }
    // CPU autodetection is a host concern; the widest portable choice.
    Ok(Target::Generic)
}

fn read_rays(reader: &mut dyn BufRead, interactive: bool) -> Result<Vec<Ray>> {
    let mut rays = Vec::new();

    loop {
        if interactive {
            print!(">> ");
            std::io::stdout().flush().ok();
        }

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }

        let values: Vec<f32> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .with_context(|| format!("Invalid ray line '{}'", line.trim()))?;
        if values.len() < 6 {
            bail!("Invalid ray line '{}': expected at least 6 values", line.trim());
        }

        let tmin = values.get(6).copied().unwrap_or(0.0);
        let mut tmax = values.get(7).copied().unwrap_or(f32::MAX);
        if tmax <= tmin {
            tmax = f32::MAX;
        }

        rays.push(Ray {
            origin: Vec3::new(values[0], values[1], values[2]),
            direction: Vec3::new(values[3], values[4], values[5]),
            range: Vec2::new(tmin, tmax),
        });
    }

    Ok(rays)
}

fn write_output(writer: &mut dyn Write, data: &[f32], count: usize, spp: u32) -> Result<()> {
    for i in 0..count {
        writeln!(
            writer,
            "{} {} {}",
            data[3 * i] / spp as f32,
            data[3 * i + 1] / spp as f32,
            data[3 * i + 2] / spp as f32,
        )?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let target = pick_target(args)?;

    let rays = match &args.input {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Could not open ray list '{}'", path.display()))?;
            read_rays(&mut std::io::BufReader::new(file), false)?
        }
        None => {
            let stdin = std::io::stdin();
            let mut lock = stdin.lock();
            read_rays(&mut lock, !args.quiet)?
        }
    };

    if rays.is_empty() {
        bail!("No rays given");
    }

    let options = RuntimeOptions {
        target,
        device: args.device,
        is_tracer: true,
        ..Default::default()
    };

    let mut runtime = Runtime::new(options, Box::new(RecordingDevice::new()))?;
    runtime
        .load_from_file(&args.scene)
        .with_context(|| format!("Could not load scene '{}'", args.scene.display()))?;

    let mut accum = vec![0.0f32; rays.len() * 3];
    for _ in 0..args.count {
        let iteration = runtime.trace(&rays)?;
        for (acc, &v) in accum.iter_mut().zip(iteration) {
            *acc += v;
        }
    }

    match &args.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Could not open output '{}'", path.display()))?;
            write_output(&mut file, &accum, rays.len(), args.count)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_output(&mut lock, &accum, rays.len(), args.count)?;
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(&args);

    if let Err(err) = run(&args) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_lines_parse_with_and_without_ranges() {
        let input = "0 0 0 0 0 1 0 100\n1 2 3 0 1 0\n";
        let mut reader = std::io::BufReader::new(input.as_bytes());
        let rays = read_rays(&mut reader, false).unwrap();

        assert_eq!(rays.len(), 2);
        assert_eq!(rays[0].range, Vec2::new(0.0, 100.0));
        assert_eq!(rays[1].origin, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(rays[1].range.y, f32::MAX);
    }

    #[test]
    fn degenerate_ranges_open_up() {
        let input = "0 0 0 0 0 1 5 2\n";
        let mut reader = std::io::BufReader::new(input.as_bytes());
        let rays = read_rays(&mut reader, false).unwrap();
        assert_eq!(rays[0].range.x, 5.0);
        assert_eq!(rays[0].range.y, f32::MAX);
    }

    #[test]
    fn bad_lines_are_rejected() {
        let input = "0 0 0 nope 0 1\n";
        let mut reader = std::io::BufReader::new(input.as_bytes());
        assert!(read_rays(&mut reader, false).is_err());
    }

    #[test]
    fn target_selection_matches_the_cli_table() {
        for (name, expected) in [
            ("sse42", Target::Sse42),
            ("avx", Target::Avx),
            ("avx2", Target::Avx2),
            ("avx512", Target::Avx512),
            ("asimd", Target::Asimd),
            ("nvvm", Target::Nvvm),
            ("amdgpu", Target::Amdgpu),
            ("generic", Target::Generic),
        ] {
            assert_eq!(Target::from_name(name), Some(expected));
        }
        assert_eq!(Target::from_name("quantum"), None);
    }

    #[test]
    fn output_divides_by_sample_count() {
        let data = [2.0f32, 4.0, 6.0];
        let mut out = Vec::new();
        write_output(&mut out, &data, 1, 2).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 2 3\n");
    }
}
