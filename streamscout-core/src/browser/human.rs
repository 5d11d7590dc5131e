use std::time::Duration;

use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;

use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;

use crate::config::HumanSimulationSection;

use super::error::{BrowserError, BrowserResult};

#[derive(Debug, Clone)]
pub struct PointerStep {
    pub point: Point,
    pub delay: Duration,
}

/// Drives the pointer along eased, slightly noisy paths before pressing.
#[derive(Debug)]
pub struct PointerController {
    config: HumanSimulationSection,
    last_point: Option<Point>,
    rng: StdRng,
}

impl PointerController {
    pub fn new(config: HumanSimulationSection) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: HumanSimulationSection, rng: StdRng) -> Self {
        Self {
            config,
            last_point: None,
            rng,
        }
    }

    /// Moves to a point inside `element` and presses there.
    pub async fn click_element(&mut self, page: &Page, element: &Element) -> BrowserResult<()> {
        let bbox = element.bounding_box().await.map_err(|err| {
            BrowserError::Element(format!("failed to get element bounding box: {err}"))
        })?;
        let jitter = self.config.mouse_jitter_px as f64;
        let target = Point::new(
            bbox.x + self.rng.gen_range(0.3..0.7) * bbox.width + self.random_offset(jitter),
            bbox.y + self.rng.gen_range(0.3..0.7) * bbox.height + self.random_offset(jitter),
        );

        for step in self.plan_path(target) {
            page.move_mouse(step.point)
                .await
                .map_err(|err| BrowserError::Element(format!("failed to move pointer: {err}")))?;
            sleep(step.delay).await;
        }
        self.last_point = Some(target);

        sleep(self.random_duration(self.config.click_hesitation_ms)).await;
        page.click(target)
            .await
            .map_err(|err| BrowserError::Element(format!("pointer press failed: {err}")))?;
        sleep(self.random_duration(self.config.click_duration_ms)).await;
        Ok(())
    }

    fn plan_path(&mut self, target: Point) -> Vec<PointerStep> {
        let start = self.last_point.unwrap_or_else(|| Point::new(0.0, 0.0));
        let distance = ((target.x - start.x).powi(2) + (target.y - start.y).powi(2)).sqrt();
        let speed = self
            .rng
            .gen_range(self.config.mouse_speed_min_px_s..=self.config.mouse_speed_max_px_s)
            .max(1) as f64;
        let duration_secs = (distance / speed).max(0.08);
        let steps = (duration_secs * 60.0).clamp(12.0, 48.0) as usize;
        let delay = Duration::from_secs_f64(duration_secs / steps as f64);

        let mut path = Vec::with_capacity(steps + 1);
        for idx in 1..steps {
            let eased = ease_in_out_cubic(idx as f64 / steps as f64);
            path.push(PointerStep {
                point: Point::new(
                    start.x + (target.x - start.x) * eased + self.random_offset(1.2),
                    start.y + (target.y - start.y) * eased + self.random_offset(1.2),
                ),
                delay,
            });
        }
        path.push(PointerStep {
            point: target,
            delay,
        });
        path
    }

    fn random_duration(&mut self, bounds: [u32; 2]) -> Duration {
        let (low, high) = (bounds[0].min(bounds[1]), bounds[0].max(bounds[1]));
        Duration::from_millis(self.rng.gen_range(low..=high) as u64)
    }

    fn random_offset(&mut self, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        self.rng.sample(Uniform::new_inclusive(-max, max))
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
