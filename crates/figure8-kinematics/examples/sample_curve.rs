use figure8_kinematics::*;

fn main() {
    let params = CurveParameters::new(5.0, 4.0, 60.0);
    let family = CurveFamily::FigureEight;
    let dt = 5.0; // Sample spacing in seconds

    match CurveKinematics::new(params, family) {
        Ok(kinematics) => {
            println!("Sampling {} {}", family, params);
            println!("  Initial heading: {:.4} rad", kinematics.initial_heading());
            println!();

            let steps = (params.period / dt) as usize;
            for i in 0..=steps {
                let sample = kinematics.evaluate(i as f64 * dt);
                println!("Step {:>2}: {}", i, sample);
            }
        }
        Err(e) => {
            eprintln!("Failed to bind curve: {}", e);
            eprintln!("Please ensure the period ({}) is positive.", params.period);
        }
    }
}
