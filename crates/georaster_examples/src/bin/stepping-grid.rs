use georaster::prelude::*;
use georaster_examples::init_tracing;
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let rect = PixelRect::new(0, 0, 1200, 800);

    for budget in [1, 10, 100, 2500] {
        let stepping = create_stepping(rect, budget)?;
        info!(
            budget,
            step_x = stepping.step_x(),
            step_y = stepping.step_y(),
            points = stepping.point_count(),
            "stepping"
        );
    }

    let stepping = create_stepping(PixelRect::of_size(10, 10), 10)?;
    let points: Vec<(usize, usize)> = stepping.points().collect();
    println!("10x10 with 10 points: {points:?}");
    Ok(())
}
