use std::process;
use std::thread;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;
use rand::Rng;

use dist_sort::{Context, ProcessGroup, SortIo, ThreadGroup, TypeLayout};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let order: Order = arg_parser.value_of_t_or_exit("sort");
    let members: usize = arg_parser.value_of_t_or_exit("members");
    let count: usize = arg_parser.value_of_t_or_exit("count");
    let variable = arg_parser.is_present("variable");
    let threshold = arg_parser
        .value_of("gather_threshold")
        .expect("value is required")
        .parse::<ByteSize>()
        .expect("value is pre-validated")
        .as_u64();

    if members == 0 {
        log::error!("the group needs at least one member");
        process::exit(1);
    }

    let group = ThreadGroup::create(members);
    let verified = thread::scope(|scope| {
        let handles: Vec<_> = group
            .into_iter()
            .map(|member| scope.spawn(move || run_member(member, count, variable, order, threshold)))
            .collect();
        handles
            .into_iter()
            .all(|handle| handle.join().unwrap_or(false))
    });

    if !verified {
        log::error!("distributed sort verification failed");
        process::exit(1);
    }
    log::info!("distributed sort verified");
}

/// One group member: generate random integer records, run the
/// collective sort, and hand the sorted share to member 0 for a global
/// order check.
fn run_member(member: ThreadGroup, count: usize, variable: bool, order: Order, threshold: u64) -> bool {
    let ctx = Context::builder().with_gather_threshold(threshold).build();
    let layout = TypeLayout::int();
    let op = match order {
        Order::Asc => ctx.int_ascending(),
        Order::Desc => ctx.int_descending(),
    };

    let mut rng = rand::thread_rng();
    let local_count = if variable { rng.gen_range(0..=count) } else { count };
    let mut buf: Vec<u8> = (0..local_count)
        .flat_map(|_| rng.gen::<i32>().to_ne_bytes())
        .collect();
    log::info!("member {} contributing {} records", member.rank(), local_count);

    let result = if variable {
        ctx.sortv(SortIo::InPlace(&mut buf), local_count, &layout, &layout, op, &member)
    } else {
        ctx.sort(SortIo::InPlace(&mut buf), local_count, &layout, &layout, op, &member)
    };
    if let Err(err) = result {
        log::error!("member {} sort failed: {}", member.rank(), err);
        return false;
    }

    match member.gather(0, &buf) {
        Ok(Some(parts)) => {
            let all = to_ints(&parts.concat());
            let ordered = all.windows(2).all(|pair| match order {
                Order::Asc => pair[0] <= pair[1],
                Order::Desc => pair[0] >= pair[1],
            });
            log::info!("member 0 checked {} records in rank order", all.len());
            ordered
        }
        Ok(None) => true,
        Err(err) => {
            log::error!("member {} result gathering failed: {}", member.rank(), err);
            false
        }
    }
}

fn to_ints(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Order::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Order as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("dist-sort")
        .about("distributed record sorter")
        .arg(
            clap::Arg::new("members")
                .short('m')
                .long("members")
                .help("number of group members to run")
                .takes_value(true)
                .default_value("4"),
        )
        .arg(
            clap::Arg::new("count")
                .short('c')
                .long("count")
                .help("records per member (the upper bound with --variable)")
                .takes_value(true)
                .default_value("1024"),
        )
        .arg(
            clap::Arg::new("variable")
                .short('v')
                .long("variable")
                .help("let every member contribute a different record count")
                .takes_value(false),
        )
        .arg(
            clap::Arg::new("sort")
                .short('s')
                .long("sort")
                .help("sorting order")
                .takes_value(true)
                .default_value("asc")
                .possible_values(Order::possible_values()),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("gather_threshold")
                .short('g')
                .long("gather-threshold")
                .help("total volume up to which the variable sort gathers to one member")
                .takes_value(true)
                .default_value("32MiB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Gather threshold format incorrect: {}", err)),
                }),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
