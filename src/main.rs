use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::process::ExitCode;

use pdfmerge::{merge_to, MergeOptions, MergeRequest, PageOrder, Source, XrefFormat};

fn usage() {
    let name = std::env::args().next().unwrap_or("pdfmerge".into());
    eprintln!("Usage: {name} [-v...] [--xref-stream] [--pages N,N,...] -o OUTPUT INPUT INPUT...");
}

fn main() -> ExitCode {
    let mut verbosity = 1;
    let mut options = MergeOptions::default();
    let mut output = None;
    let mut inputs = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" => verbosity += 1,
            "--xref-stream" => options.xref_format = XrefFormat::Stream,
            "--pages" => {
                let Some(list) = args.next() else {
                    usage();
                    return ExitCode::FAILURE;
                };
                let Ok(indices) = list.split(',').map(str::parse).collect::<Result<Vec<usize>, _>>() else {
                    eprintln!("--pages expects a comma-separated list of page indices");
                    return ExitCode::FAILURE;
                };
                options.page_order = PageOrder::Explicit(indices);
            },
            "-o" => output = args.next(),
            "-h" | "--help" => {
                usage();
                return ExitCode::SUCCESS;
            },
            _ => inputs.push(arg)
        }
    }

    stderrlog::new()
        .verbosity(verbosity)
        .init()
        .unwrap();

    let (Some(output), true) = (output, inputs.len() >= 2) else {
        usage();
        return ExitCode::FAILURE;
    };

    match run(&inputs, &output, options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(inputs: &[String], output: &str, options: MergeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut sources = Vec::with_capacity(inputs.len());
    for fname in inputs {
        let mut bytes = Vec::new();
        File::open(fname)?.read_to_end(&mut bytes)?;
        sources.push(Source::new(bytes, fname.as_str()));
    }
    let mut sink = BufWriter::new(File::create(output)?);
    merge_to(MergeRequest { sources, options }, &mut sink)?;
    sink.flush()?;
    Ok(())
}
