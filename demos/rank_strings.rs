use std::thread;

use env_logger;
use log;

use dist_sort::{Context, ProcessGroup, ThreadGroup};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let members = ThreadGroup::create(2);
    let inputs: Vec<Vec<&str>> = vec![
        vec!["node12", "node07", "node12"],
        vec!["node07", "node31"],
    ];

    thread::scope(|scope| {
        for (member, strings) in members.into_iter().zip(inputs) {
            scope.spawn(move || {
                let ctx = Context::new();
                let result = ctx.rank_strings(&strings, &member).unwrap();

                for (at, name) in strings.iter().enumerate() {
                    println!(
                        "member {}: {:?} -> group {} of {} (rank {} in a group of {})",
                        member.rank(),
                        name,
                        result.group_id[at],
                        result.groups,
                        result.group_rank[at],
                        result.group_size[at],
                    );
                }
            });
        }
    });
}
