use anyhow::Result;
use echotrace::ir::decay::rt60;
use echotrace::{
    render_impulse_response, FrequencyBands, Mesh, Point, Simulation, SimulationParams, Sphere,
};

fn main() -> Result<()> {
    // A 8 x 6 x 3 m shoebox room, source near one corner, receiver near
    // the opposite one.
    let mesh = Mesh::from_box(8.0, 6.0, 3.0, None)?;
    let source = Point::new(2.0, 2.0, 1.5);
    let receiver = Sphere::new(Point::new(6.0, 4.0, 1.5), 0.5);

    let mut params = SimulationParams::new();
    params.num_rays = 20_000;
    params.max_bounces = 60;
    params.seed = "shoebox".to_string();
    params.bands = FrequencyBands::new(
        vec![200.0, 800.0, 3200.0, 10000.0],
        vec![0.08, 0.12, 0.25, 0.40],
    );
    params.rr_config.enabled = true;
    params.rr_config.scattering_coeff = 0.3;
    params.rr_config.hybrid_bounce_threshold = 3;

    println!("Tracing {} rays...", params.num_rays);
    let bands = params.bands.clone();
    let sim = Simulation::new(&mesh, source, receiver, params)?;
    let output = sim.run_with_progress(|p| {
        println!(
            "  {:5.1}% | {:8.0} rays/s | {} arrivals",
            p.fraction_done * 100.0,
            p.rays_per_second,
            p.total_arrivals
        );
    })?;

    println!();
    println!(
        "Done: {} arrivals ({} late), {:.0} rays/s average",
        output.total_arrivals,
        output.radiosity.late_arrival_count,
        output.avg_rays_per_second
    );

    let sample_rate = 44100.0;
    let ir = render_impulse_response(&output.arrivals_by_band, &bands, sample_rate);
    println!(
        "Impulse response: {:.2} s at {} Hz",
        ir.duration(),
        sample_rate
    );

    println!();
    println!("{:>8} {:>10}", "Freq", "RT60 (s)");
    for (band, &freq) in ir.band_centers.iter().enumerate() {
        let rt = rt60(&ir.band_samples[band], sample_rate)
            .map(|v| format!("{v:.3}"))
            .unwrap_or_else(|| "  ---".to_string());
        println!("{freq:>7.0} Hz {rt:>10}");
    }

    if let Some(path) = std::env::args().nth(1) {
        ir.write_wav(&path)?;
        println!();
        println!("Wrote {path}");
    }

    Ok(())
}
