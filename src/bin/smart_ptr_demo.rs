// Walks through construction, copying, moving, chained assignment and
// detaching, logging the count and value at each step.
//
// Run with: RUST_LOG=trace cargo run --bin smart_ptr_demo

use anyhow::{Context, Result};
use colored::Colorize;
use log::{error, info};
use shared_handle::{HandleError, SharedHandle};

#[derive(Debug, Clone)]
struct Point {
    x: i32,
    y: i32,
}

impl Default for Point {
    fn default() -> Self {
        Point { x: 2, y: -5 }
    }
}

fn section(title: &str) {
    println!("\n{}", format!("=== {} ===", title).bold().cyan());
}

fn copies_and_moves() -> Result<()> {
    section("Copy and move");

    let mut raw = Some(Box::new(42));
    let mut sp1 = SharedHandle::adopt(&mut raw);
    info!("sp1 count = {}", sp1.ref_count());
    {
        let sp2 = sp1.clone();
        info!("sp1 count = {}, sp2 count = {}", sp1.ref_count(), sp2.ref_count());
    }
    info!("sp1 count = {}", sp1.ref_count());

    let mut sp3 = SharedHandle::new();
    info!("sp3 count = {}", sp3.ref_count());
    sp3.assign(&sp1);
    info!("sp1 count = {}, sp3 count = {}", sp1.ref_count(), sp3.ref_count());

    let sp4 = sp1.take();
    info!(
        "sp4 = {}, sp3 = {}",
        *sp4.get().context("reading sp4")?,
        *sp3.get().context("reading sp3")?
    );

    match sp1.get() {
        Err(HandleError::NullAccess) => info!("sp1 was moved out of: {}", HandleError::NullAccess),
        Err(err) => error!("unexpected error: {}", err),
        Ok(value) => error!("moved-out handle still reads {}", *value),
    }

    let mut sp5 = SharedHandle::new();
    sp5.assign_from(&mut sp3);
    info!("sp5 = {}, sp3 count = {}", *sp5.get().context("reading sp5")?, sp3.ref_count());
    Ok(())
}

fn member_access() -> Result<()> {
    section("Member access");

    let sp = SharedHandle::from_value(Point::default());
    let point = sp.get().context("reading point")?;
    info!("x = {}, y = {}", point.x, point.y);
    Ok(())
}

fn chained_assignment_and_detach() -> Result<()> {
    section("Chained assignment and detach");

    let mut dsp1 = SharedHandle::from_value(3.5_f64);
    let mut dsp2 = SharedHandle::new();
    let mut dsp3 = SharedHandle::new();

    dsp3.assign(dsp2.assign(&dsp1));
    report(&dsp1, &dsp2, &dsp3)?;

    let split = dsp1.detach();
    info!("dsp1.detach() returned {}", split);
    report(&dsp1, &dsp2, &dsp3)?;

    info!("detaching again returns {}", dsp1.detach());
    Ok(())
}

fn report(a: &SharedHandle<f64>, b: &SharedHandle<f64>, c: &SharedHandle<f64>) -> Result<()> {
    info!("counts: {} {} {}", a.ref_count(), b.ref_count(), c.ref_count());
    info!(
        "values: {} {} {}",
        *a.get().context("reading dsp1")?,
        *b.get().context("reading dsp2")?,
        *c.get().context("reading dsp3")?
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    copies_and_moves()?;
    member_access()?;
    chained_assignment_and_detach()?;

    println!("\n{}", "Shared handle demo completed".green());
    Ok(())
}
