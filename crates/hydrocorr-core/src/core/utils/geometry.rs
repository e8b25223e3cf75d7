use nalgebra::Vector3;

/// Wraps one displacement component into the nearest periodic image of a box of edge `length`.
#[inline]
pub fn minimum_image(delta: f64, length: f64) -> f64 {
    let d = delta.abs() % length;
    if d >= 0.5 * length { d - length } else { d }
}

/// Minimum-image displacement between two points in a cubic periodic box.
///
/// Components are returned in `[-L/2, L/2)` up to sign, which is all a
/// distance needs.
#[inline]
pub fn minimum_image_displacement(a: &Vector3<f64>, b: &Vector3<f64>, length: f64) -> Vector3<f64> {
    (a - b).map(|d| minimum_image(d, length))
}

#[inline]
pub fn minimum_image_distance(a: &Vector3<f64>, b: &Vector3<f64>, length: f64) -> f64 {
    minimum_image_displacement(a, b, length).norm()
}

/// `n` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn minimum_image_leaves_short_displacements_alone() {
        assert_relative_eq!(minimum_image(3.0, 10.0), 3.0);
        assert_relative_eq!(minimum_image(-3.0, 10.0).abs(), 3.0);
    }

    #[test]
    fn minimum_image_wraps_long_displacements() {
        assert_relative_eq!(minimum_image(9.0, 10.0).abs(), 1.0);
        assert_relative_eq!(minimum_image(-9.0, 10.0).abs(), 1.0);
        assert_relative_eq!(minimum_image(23.0, 10.0).abs(), 3.0);
    }

    #[test]
    fn minimum_image_distance_across_box_boundary() {
        let a = Vector3::new(0.5, 0.5, 0.5);
        let b = Vector3::new(9.5, 9.5, 0.5);
        assert_relative_eq!(
            minimum_image_distance(&a, &b, 10.0),
            2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn linspace_includes_both_endpoints() {
        let v = linspace(0.5, 1.5, 5);
        assert_eq!(v.len(), 5);
        assert_relative_eq!(v[1], 0.75);
        assert_eq!(v[4], 1.5);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
    }
}
