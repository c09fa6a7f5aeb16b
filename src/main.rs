mod cache;
mod config;
mod event_queue;
mod memory;
mod packet;
mod port;
mod proxy;
mod requester;
mod stats;
mod store;

use std::fs;

use env_logger::Env;
use log::info;

use crate::cache::BlockingCache;
use crate::config::SimConfig;
use crate::event_queue::EventQueue;
use crate::memory::SimMemory;
use crate::packet::{Packet, ReqFlags};
use crate::proxy::BlockingProxy;
use crate::requester::Requester;

fn main() {
    let env = Env::default()
        .filter_or("MEMSIM_LOG_LEVEL", "info")
        .write_style_or("MEMSIM_LOG_STYLE", "always");
    env_logger::init_from_env(env);

    let mut args = pico_args::Arguments::from_env();
    let mut cfg: SimConfig = if let Some(path) = args
        .opt_value_from_str::<_, String>("--config")
        .expect("--config should be a path")
    {
        let s = fs::read_to_string(path).expect("could not read config file");
        serde_json::from_str(&s).expect("invalid config json")
    } else {
        SimConfig::default()
    };
    if let Some(v) = args
        .opt_value_from_str("--latency")
        .expect("--latency should be an integer")
    {
        cfg.cache_latency = v;
    }
    if let Some(v) = args
        .opt_value_from_str("--block-size")
        .expect("--block-size should be an integer")
    {
        cfg.block_size = v;
    }
    if let Some(v) = args
        .opt_value_from_str("--mem-latency")
        .expect("--mem-latency should be an integer")
    {
        cfg.mem_latency = v;
    }
    let json_out: Option<String> = args.opt_value_from_str("--json").unwrap();

    if args.contains("--proxy") {
        run_proxy(&cfg);
    } else {
        run_cache(&cfg, json_out);
    }
}

fn cache_script() -> Vec<Packet> {
    let swap = ReqFlags { swap: true, ..Default::default() };
    vec![
        Packet::write(0x40, vec![1, 2, 3, 4]), // miss, fills the 0x40 block
        Packet::read(0x42, 2),                 // hit in the filled block
        Packet::read(0x80, 8),                 // miss in a fresh block
        Packet::write(0x84, vec![0xaa; 4]),    // hit
        Packet::write(0x10, vec![7; 4]).with_flags(swap), // bypasses the cache
    ]
}

fn run_cache(cfg: &SimConfig, json_out: Option<String>) {
    let (mut evq, tx) = EventQueue::new();
    let memory = SimMemory::new(cfg, tx.clone());
    let cache = BlockingCache::new(cfg, tx.clone());
    let cpu = Requester::new("cpu", cache_script(), evq.clock(), tx);

    cpu.borrow_mut().mem_side.bind(cache.clone());
    cache.borrow_mut().cpu_side.bind(cpu.clone());
    cache.borrow_mut().mem_side.bind(memory.clone());
    memory.borrow_mut().cpu_side.bind(cache.clone());

    info!("serving {:?}", cache.borrow().mem_side.addr_ranges());
    cpu.borrow().start();
    evq.run();

    for (t, resp) in &cpu.borrow().completed {
        println!("t={:<6} {}", t, resp);
    }
    let stats = cache.borrow().stats();
    println!(
        "finished in {} time units: {} accesses, {} hits, {} misses ({:.2} miss rate), {} memory requests",
        evq.now(),
        stats.accesses,
        stats.hits,
        stats.misses,
        stats.miss_rate(),
        memory.borrow().served(),
    );
    if let Some(path) = json_out {
        let out = fs::File::create(path).expect("cannot open output file");
        serde_json::to_writer_pretty(out, &stats).unwrap();
    }
}

fn run_proxy(cfg: &SimConfig) {
    let ifetch = ReqFlags { inst_fetch: true, ..Default::default() };
    let (mut evq, tx) = EventQueue::new();
    let memory = SimMemory::new(cfg, tx.clone());
    let proxy = BlockingProxy::new(cfg, tx.clone());
    let icpu = Requester::new(
        "icpu",
        vec![
            Packet::read(0x1000, 4).with_flags(ifetch),
            Packet::read(0x1004, 4).with_flags(ifetch),
        ],
        evq.clock(),
        tx.clone(),
    );
    let dcpu = Requester::new(
        "dcpu",
        vec![
            Packet::write(0x40, vec![1, 2, 3, 4]),
            Packet::read(0x40, 4),
        ],
        evq.clock(),
        tx,
    );

    icpu.borrow_mut().mem_side.bind(proxy.clone());
    dcpu.borrow_mut().mem_side.bind(proxy.clone());
    proxy.borrow_mut().iport.bind(icpu.clone());
    proxy.borrow_mut().dport.bind(dcpu.clone());
    proxy.borrow_mut().mem_side.bind(memory.clone());
    memory.borrow_mut().cpu_side.bind(proxy.clone());

    icpu.borrow().start();
    dcpu.borrow().start();
    evq.run();

    for (name, cpu) in [("icpu", &icpu), ("dcpu", &dcpu)] {
        for (t, resp) in &cpu.borrow().completed {
            println!("{} t={:<6} {}", name, t, resp);
        }
    }
    println!(
        "finished in {} time units, {} memory requests",
        evq.now(),
        memory.borrow().served(),
    );
}
