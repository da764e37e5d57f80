use std::thread;

use env_logger;
use log;

use dist_sort::{Context, ProcessGroup, SortIo, ThreadGroup, TypeLayout};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let members = ThreadGroup::create(4);
    let inputs: Vec<Vec<i32>> = vec![
        vec![31, 4, 15, 9],
        vec![2, 65, 35, 8],
        vec![97, 9, 32, 38],
        vec![4, 62, 64, 33],
    ];

    thread::scope(|scope| {
        for (member, keys) in members.into_iter().zip(inputs) {
            scope.spawn(move || {
                let ctx = Context::new();
                let layout = TypeLayout::int();
                let mut buf: Vec<u8> = keys.iter().flat_map(|key| key.to_ne_bytes()).collect();

                ctx.sort(SortIo::InPlace(&mut buf), keys.len(), &layout, &layout, ctx.int_ascending(), &member)
                    .unwrap();

                let sorted: Vec<i32> = buf
                    .chunks_exact(4)
                    .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                println!("member {}: {:?}", member.rank(), sorted);
            });
        }
    });
}
