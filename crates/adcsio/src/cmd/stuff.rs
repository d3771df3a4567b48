use adcsio_frame::{destuff, stuff};
use serde::Serialize;

use crate::cmd::BytesArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{parse_hex, print_fields, print_json, print_raw, to_hex, OutputFormat};

#[derive(Serialize)]
struct StuffOutput {
    operation: &'static str,
    input_len: usize,
    output_len: usize,
    output: String,
}

pub fn run_stuff(args: BytesArgs, format: OutputFormat) -> CliResult<i32> {
    let input = parse_hex(&args.hex)?;
    let mut out = Vec::with_capacity(input.len() * 2);
    stuff(&input, &mut out);
    print_result("stuff", input.len(), &out, format);
    Ok(SUCCESS)
}

pub fn run_destuff(args: BytesArgs, format: OutputFormat) -> CliResult<i32> {
    let input = parse_hex(&args.hex)?;
    let mut out = Vec::with_capacity(input.len());
    destuff(&input, &mut out);
    print_result("destuff", input.len(), &out, format);
    Ok(SUCCESS)
}

fn print_result(operation: &'static str, input_len: usize, out: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StuffOutput {
            operation,
            input_len,
            output_len: out.len(),
            output: to_hex(out),
        }),
        OutputFormat::Table => print_fields(&[
            ("operation", operation.to_string()),
            ("input bytes", input_len.to_string()),
            ("output bytes", out.len().to_string()),
            ("output", to_hex(out)),
        ]),
        OutputFormat::Pretty => println!("{}", to_hex(out)),
        OutputFormat::Raw => print_raw(out),
    }
}
