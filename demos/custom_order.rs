use std::thread;

use env_logger;
use log;

use dist_sort::{CompareOp, Context, ProcessGroup, SortIo, ThreadGroup, TypeLayout};

/// A task record: a priority and a submission stamp the comparator
/// inspects, plus a task id carried as satellite payload.
fn record(priority: i32, submitted: i32, id: i32) -> Vec<u8> {
    let mut bytes = priority.to_ne_bytes().to_vec();
    bytes.extend_from_slice(&submitted.to_ne_bytes());
    bytes.extend_from_slice(&id.to_ne_bytes());
    bytes
}

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let members = ThreadGroup::create(2);
    let inputs: Vec<Vec<(i32, i32, i32)>> = vec![
        vec![(2, 300, 11), (1, 100, 12), (2, 900, 13)],
        vec![(1, 700, 21), (2, 500, 22)],
    ];

    thread::scope(|scope| {
        for (member, tasks) in members.into_iter().zip(inputs) {
            scope.spawn(move || {
                let ctx = Context::new();
                // order by priority, the freshest submission first on ties
                let op = CompareOp::series(ctx.int_ascending(), ctx.int_descending());
                let key = TypeLayout::contiguous(8);
                let keysat = TypeLayout::contiguous(12);

                let mut buf: Vec<u8> = tasks
                    .iter()
                    .flat_map(|&(priority, submitted, id)| record(priority, submitted, id))
                    .collect();

                ctx.sortv(SortIo::InPlace(&mut buf), tasks.len(), &key, &keysat, &op, &member)
                    .unwrap();

                for chunk in buf.chunks_exact(12) {
                    let priority = i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    let submitted = i32::from_ne_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
                    let id = i32::from_ne_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]);
                    println!(
                        "member {}: task {} (priority {}, submitted {})",
                        member.rank(),
                        id,
                        priority,
                        submitted
                    );
                }
            });
        }
    });
}
