// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::time::Duration;

use structopt::StructOpt;

use balknap::{balknap, BalknapParams, Instance, UbPolicy};

/// Solves 0-1 knapsack instances to optimality with the balanced
/// primal-dual dynamic programming algorithm.
#[derive(StructOpt)]
struct Balknap {
    /// Path to the instance file
    fname: String,
    /// Instance format: standard, pisinger or subsetsum_standard
    #[structopt(short, long, default_value = "standard")]
    format: String,
    /// Log the progression
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
    /// Width of the packed partial-solution window (1 to 64)
    #[structopt(short = "x", long, default_value = "64")]
    part_size: isize,
    /// Skip the greedy initial lower bound
    #[structopt(long)]
    no_greedy: bool,
    /// State-map size at which the greedynlogn lower bound fires (-1 never)
    #[structopt(short, long, default_value = "-1", allow_hyphen_values = true)]
    greedynlogn: i64,
    /// State-map size at which the surrogate relaxation fires (-1 never)
    #[structopt(short, long, default_value = "-1", allow_hyphen_values = true)]
    surrelax: i64,
    /// Reference item of the Dembo bounds: b (break item) or t (moving item)
    #[structopt(short, long, default_value = "b")]
    ub: String,
    /// Time limit, in milliseconds
    #[structopt(short, long)]
    time_limit: Option<u64>,
}

fn main() {
    let args = Balknap::from_args();

    let instance = match Instance::from_file(&args.fname, &args.format) {
        Ok(instance) => instance,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };
    let ub = match args.ub.as_str() {
        "b" => UbPolicy::Break,
        "t" => UbPolicy::Moving,
        other => {
            eprintln!("unknown upper bound policy: {}", other);
            std::process::exit(1);
        }
    };

    let mut params = BalknapParams::default()
        .with_partial_solution_size(args.part_size)
        .with_greedy(!args.no_greedy)
        .with_greedynlogn(args.greedynlogn)
        .with_surrelax(args.surrelax)
        .with_ub(ub)
        .with_verbosity(args.verbose);
    if let Some(ms) = args.time_limit {
        params = params.with_time_limit(Duration::from_millis(ms));
    }

    let expected = instance.optimum();
    let output = balknap(instance, &params);

    println!("OPT {}", output.solution.profit());
    if let Some(opt) = expected {
        println!("EXP {}", opt);
    }
}
