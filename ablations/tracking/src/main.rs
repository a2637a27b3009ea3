//! 追踪参数消融实验.
//!
//! 在一组合成体模上, 以若干组参数 (每组一个线程) 追踪插植针,
//! 统计耗时与控制点相对真实针轴线的误差.

mod result;
mod runner;
mod variants;

fn main() -> std::io::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .expect("Logger initialization error");

    runner::run().analyze()
}
