//! tntdriver CLI Client
//!
//! Command-line interface for talking to a Tarantool server.

use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};
use tntdriver::{Client, ClientSource, Config, Iter, ResultCursor, Session, SizedPool};
use tracing_subscriber::{fmt, EnvFilter};

/// tntdriver CLI
#[derive(Parser, Debug)]
#[command(name = "tnt-cli")]
#[command(about = "CLI for the Tarantool binary protocol")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "3301")]
    port: u16,

    /// Connect timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    /// Read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Print the server banner
    Version,

    /// Evaluate a Lua expression
    Eval {
        /// The expression to evaluate
        expression: String,
    },

    /// Run an SQL statement
    Sql {
        /// The statement text
        query: String,
    },

    /// Select tuples from a space
    Select {
        /// Space id
        space: u32,

        /// Index id
        #[arg(short, long, default_value = "0")]
        index: u32,

        /// Maximum number of tuples
        #[arg(short, long, default_value = "100")]
        limit: u32,

        /// Tuples to skip
        #[arg(short, long, default_value = "0")]
        offset: u32,

        /// Key fields; integers are sent as numbers, anything else as strings
        keys: Vec<String>,
    },

    /// Ping through a sized pool from several threads
    Stress {
        /// Worker threads
        #[arg(short, long, default_value = "8")]
        threads: usize,

        /// Pings per thread
        #[arg(short, long, default_value = "1000")]
        iterations: usize,

        /// Pool capacity
        #[arg(long, default_value = "4")]
        pool_size: usize,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tntdriver=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .connect_timeout_ms(args.connect_timeout_ms)
        .read_timeout_ms(args.read_timeout_ms)
        .build();

    if let Err(e) = run(config, args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(config: Config, command: Commands) -> tntdriver::Result<()> {
    let connect = || Session::connect(&config);

    match command {
        Commands::Ping => {
            let mut session = connect()?;
            let started = Instant::now();
            session.ping()?;
            println!("PONG ({:?})", started.elapsed());
        }
        Commands::Version => {
            let session = connect()?;
            println!("{}", session.version()?);
        }
        Commands::Eval { expression } => {
            let mut session = connect()?;
            session.eval(&expression)?;
            print_rows(session.execute()?)?;
        }
        Commands::Sql { query } => {
            let mut session = connect()?;
            session.sql(&query)?;
            print_rows(session.execute()?)?;
        }
        Commands::Select {
            space,
            index,
            limit,
            offset,
            keys,
        } => {
            let mut session = connect()?;
            let iter = if keys.is_empty() { Iter::All } else { Iter::Eq };
            session.select(space, index, limit, offset, iter)?;
            for key in &keys {
                match key.parse::<i64>() {
                    Ok(n) => session.set_long(n)?,
                    Err(_) => session.set_string(Some(key))?,
                }
            }
            print_rows(session.execute()?)?;
        }
        Commands::Stress {
            threads,
            iterations,
            pool_size,
        } => stress(config.clone(), threads, iterations, pool_size)?,
    }
    Ok(())
}

fn print_rows(cursor: &mut ResultCursor) -> tntdriver::Result<()> {
    if let Some(columns) = cursor.columns() {
        println!("{}", columns.join(" | "));
    }
    while cursor.next()? {
        let row: Vec<String> = cursor.values()?.iter().map(|v| v.to_string()).collect();
        println!("[{}]", row.join(", "));
    }
    match cursor.affected_rows() {
        Some(count) => println!("({} rows affected)", count),
        None => println!("({} rows)", cursor.size()),
    }
    Ok(())
}

fn stress(config: Config, threads: usize, iterations: usize, pool_size: usize) -> tntdriver::Result<()> {
    let pool = SizedPool::connect(config, pool_size);
    let failures = AtomicUsize::new(0);
    let started = Instant::now();

    let outcome = crossbeam::scope(|s| {
        for _ in 0..threads {
            s.spawn(|_| {
                for _ in 0..iterations {
                    let result = pool.acquire().and_then(|mut lease| lease.ping());
                    if let Err(e) = result {
                        tracing::warn!("Ping failed: {}", e);
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });
    if outcome.is_err() {
        tracing::error!("A stress worker panicked");
    }

    let elapsed = started.elapsed();
    let total = threads * iterations;
    let failed = failures.load(Ordering::Relaxed);
    println!(
        "{} pings in {:?} ({:.0}/s), {} failed, pool {:?}",
        total,
        elapsed,
        total as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        failed,
        pool.stats()
    );
    pool.close();
    Ok(())
}
