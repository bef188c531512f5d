//! `discrete-plot` and `continuous-plot`: scene synthesis.
//!
//! Both forms return a flat list of render primitives (nodes tagged with `object-name`)
//! laid out in a 20x20 box. Data coordinates are divided by the data range and scaled
//! by 20, with y negated so that larger values are drawn higher up.

use super::{call_lambda, eval_with_depth_tracking};
use crate::Error;
use crate::atom::{Atom, format_general};
use crate::environment::Environment;
use crate::expression::{Expression, OBJECT_NAME};

/// Side length of the plot box in scene units
const PLOT_SIZE: f64 = 20.0;
/// Number of intervals sampled by `continuous-plot`
const SAMPLE_INTERVALS: u32 = 50;
/// Interior angle in degrees below which a sampled vertex is smoothed
const SMOOTHING_ANGLE: f64 = 175.0;
const POINT_SIZE: f64 = 0.5;
const AXIS_LABEL_OFFSET: f64 = 2.0;

fn plot_error(message: &str) -> Error {
    Error::PlotError(message.to_owned())
}

/// Data extent of a plot
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn of(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bounds = Bounds {
            min_x: x0,
            max_x: x0,
            min_y: y0,
            max_y: y0,
        };
        for &(x, y) in rest {
            bounds.min_x = bounds.min_x.min(x);
            bounds.max_x = bounds.max_x.max(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_y = bounds.max_y.max(y);
        }
        Some(bounds)
    }

    fn scale_x(&self, x: f64) -> f64 {
        x / (self.max_x - self.min_x) * PLOT_SIZE
    }

    fn scale_y(&self, y: f64) -> f64 {
        -y / (self.max_y - self.min_y) * PLOT_SIZE
    }

    /// A data point in scene coordinates
    fn scaled(&self, x: f64, y: f64) -> Expression {
        Expression::point(self.scale_x(x), self.scale_y(y))
    }
}

/// Options shared by both plot forms
#[derive(Debug, Default)]
struct PlotOptions {
    title: Option<Atom>,
    abscissa_label: Option<Atom>,
    ordinate_label: Option<Atom>,
    text_scale: f64,
}

impl PlotOptions {
    /// Validate an option list of `(name value)` pairs; later entries win
    fn parse(options: &Expression) -> Result<Self, Error> {
        let mut parsed = PlotOptions {
            text_scale: 1.0,
            ..PlotOptions::default()
        };

        for option in options.tail() {
            if !option.is_list() {
                return Err(plot_error("one or more options is not a list"));
            }
            let [name, value] = option.tail() else {
                return Err(plot_error(
                    "one or more options has incorrect amount of properties",
                ));
            };
            if !name.is_string() {
                return Err(plot_error("Option type is not a string"));
            }

            let label = value.is_string().then(|| value.head().clone());
            match name.head().string_content() {
                "title" => parsed.title = label.or(parsed.title),
                "abscissa-label" => parsed.abscissa_label = label.or(parsed.abscissa_label),
                "ordinate-label" => parsed.ordinate_label = label.or(parsed.ordinate_label),
                "text-scale" => {
                    let Some(scale) = value.as_number() else {
                        return Err(plot_error("Text-scale not given a number property"));
                    };
                    if scale <= 0.0 {
                        return Err(plot_error("Number value is not positive"));
                    }
                    parsed.text_scale = scale;
                }
                other => log::debug!("ignoring unknown plot option {other}"),
            }
        }

        Ok(parsed)
    }
}

fn point(x: f64, y: f64, bounds: &Bounds) -> Expression {
    bounds
        .scaled(x, y)
        .with_property(OBJECT_NAME, Expression::new(Atom::string("point")))
        .with_property("size", Expression::from(POINT_SIZE))
}

fn line(from: Expression, to: Expression) -> Expression {
    Expression::list(vec![from, to])
        .with_property(OBJECT_NAME, Expression::new(Atom::string("line")))
        .with_property("thickness", Expression::from(0.0))
}

fn text(content: Atom, x: f64, y: f64, scale: f64) -> Expression {
    Expression::new(content)
        .with_property(OBJECT_NAME, Expression::new(Atom::string("text")))
        .with_property("position", Expression::point(x, y))
        .with_property("scale", Expression::from(scale))
}

/// The four edges of the bounding box
fn bounding_box(bounds: &Bounds) -> Vec<Expression> {
    let Bounds {
        min_x,
        max_x,
        min_y,
        max_y,
    } = *bounds;
    vec![
        line(bounds.scaled(min_x, min_y), bounds.scaled(min_x, max_y)),
        line(bounds.scaled(min_x, min_y), bounds.scaled(max_x, min_y)),
        line(bounds.scaled(max_x, min_y), bounds.scaled(max_x, max_y)),
        line(bounds.scaled(min_x, max_y), bounds.scaled(max_x, max_y)),
    ]
}

/// Axis lines through the origin, for each axis whose range contains zero
fn origin_axes(bounds: &Bounds) -> Vec<Expression> {
    let mut axes = Vec::new();
    if bounds.min_x <= 0.0 && bounds.max_x >= 0.0 {
        axes.push(line(
            bounds.scaled(0.0, bounds.min_y),
            bounds.scaled(0.0, bounds.max_y),
        ));
    }
    if bounds.min_y <= 0.0 && bounds.max_y >= 0.0 {
        axes.push(line(
            bounds.scaled(bounds.min_x, 0.0),
            bounds.scaled(bounds.max_x, 0.0),
        ));
    }
    axes
}

/// One line per datum from the baseline up (or down) to the datum
fn stems(points: &[(f64, f64)], bounds: &Bounds) -> Vec<Expression> {
    let baseline = if bounds.max_y < 0.0 {
        bounds.max_y
    } else if bounds.min_y > 0.0 {
        bounds.min_y
    } else {
        0.0
    };
    points
        .iter()
        .map(|&(x, y)| line(bounds.scaled(x, baseline), bounds.scaled(x, y)))
        .collect()
}

/// Labels showing the data range at the corners of the box
fn axis_labels(bounds: &Bounds, scale: f64) -> Vec<Expression> {
    let label = |value: f64| Atom::string(&format_general(value, 2));
    let min_x = bounds.scale_x(bounds.min_x);
    let max_x = bounds.scale_x(bounds.max_x);
    let min_y = bounds.scale_y(bounds.min_y);
    let max_y = bounds.scale_y(bounds.max_y);

    vec![
        text(label(bounds.min_x), min_x, min_y + AXIS_LABEL_OFFSET, scale),
        text(label(bounds.min_y), min_x - AXIS_LABEL_OFFSET, min_y, scale),
        text(label(bounds.max_y), min_x - AXIS_LABEL_OFFSET, max_y, scale),
        text(label(bounds.max_x), max_x, min_y + AXIS_LABEL_OFFSET, scale),
    ]
}

/// Title and axis captions requested through the options
fn option_labels(options: &PlotOptions, bounds: &Bounds) -> Vec<Expression> {
    let min_x = bounds.scale_x(bounds.min_x);
    let min_y = bounds.scale_y(bounds.min_y);
    let max_y = bounds.scale_y(bounds.max_y);
    let scale = options.text_scale;

    let mut labels = Vec::new();
    if let Some(title) = &options.title {
        labels.push(text(title.clone(), min_x + 10.0, max_y - 3.0, scale));
    }
    if let Some(caption) = &options.abscissa_label {
        labels.push(text(caption.clone(), min_x + 10.0, min_y + 3.0, scale));
    }
    if let Some(caption) = &options.ordinate_label {
        labels.push(
            text(caption.clone(), min_x - 3.0, min_y - 10.0, scale)
                .with_property("rotation", Expression::from(f64::atan2(-1.0, 0.0))),
        );
    }
    labels
}

/// Evaluate discrete-plot special form
pub(crate) fn eval_discrete_plot(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let [data_expr, options_expr] = args else {
        return Err(plot_error("invalid number of arguments"));
    };

    let data = eval_with_depth_tracking(data_expr, env, depth + 1)?;
    if !data.is_list() {
        return Err(plot_error("first argument is not a list on coordinates"));
    }
    let points = data
        .tail()
        .iter()
        .map(Expression::as_coordinate)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| plot_error("one or more coordinates were invalid"))?;

    let options = eval_with_depth_tracking(options_expr, env, depth + 1)?;
    if !options.is_list() {
        return Err(plot_error("second argument is not a list"));
    }
    let options = PlotOptions::parse(&options)?;

    let Some(bounds) = Bounds::of(&points) else {
        return Err(plot_error("no coordinates to plot"));
    };
    log::debug!("discrete plot of {} points", points.len());

    let mut scene: Vec<Expression> = points.iter().map(|&(x, y)| point(x, y, &bounds)).collect();
    scene.extend(bounding_box(&bounds));
    scene.extend(origin_axes(&bounds));
    scene.extend(stems(&points, &bounds));
    scene.extend(axis_labels(&bounds, options.text_scale));
    scene.extend(option_labels(&options, &bounds));
    Ok(Expression::list(scene))
}

/// Apply the plotted function to one x value
fn sample(
    function: &Expression,
    x: f64,
    env: &Environment<'_>,
    depth: usize,
) -> Result<f64, Error> {
    call_lambda(function, &[Expression::from(x)], env, depth)?
        .as_number()
        .ok_or_else(|| plot_error("function did not produce a number"))
}

/// Interior angle at `vertex` in degrees
fn vertex_angle(prev: (f64, f64), vertex: (f64, f64), next: (f64, f64)) -> f64 {
    let distance = |a: (f64, f64), b: (f64, f64)| (a.0 - b.0).hypot(a.1 - b.1);
    let to_prev = distance(prev, vertex);
    let to_next = distance(vertex, next);
    let across = distance(prev, next);
    let cosine =
        (to_prev.powi(2) + to_next.powi(2) - across.powi(2)) / (2.0 * to_prev * to_next);
    cosine.acos().to_degrees()
}

/// Insert midpoints around every sharp vertex.
///
/// Each inserted point after a vertex becomes the previous point of the next vertex.
/// A NaN angle (from rounding at a straight vertex) never counts as sharp.
fn smooth(
    samples: &[(f64, f64)],
    function: &Expression,
    env: &Environment<'_>,
    depth: usize,
) -> Result<Vec<(f64, f64)>, Error> {
    let (Some(&first), Some(&last)) = (samples.first(), samples.last()) else {
        return Ok(samples.to_vec());
    };
    if samples.len() < 3 {
        return Ok(samples.to_vec());
    }

    let mut smoothed = vec![first];
    let mut prev = first;
    for window in samples.windows(3) {
        let (vertex, next) = (window[1], window[2]);
        if vertex_angle(prev, vertex, next) < SMOOTHING_ANGLE {
            let before_x = vertex.0 + (prev.0 - vertex.0) / 2.0;
            let after_x = vertex.0 - (vertex.0 - next.0) / 2.0;
            let before = (before_x, sample(function, before_x, env, depth)?);
            let after = (after_x, sample(function, after_x, env, depth)?);
            smoothed.extend([before, vertex, after]);
            prev = after;
        } else {
            smoothed.push(vertex);
            prev = vertex;
        }
    }
    smoothed.push(last);
    Ok(smoothed)
}

/// Evaluate continuous-plot special form
pub(crate) fn eval_continuous_plot(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let (function_expr, bounds_expr, options_expr) = match args {
        [function, bounds] => (function, bounds, None),
        [function, bounds, options] => (function, bounds, Some(options)),
        _ => return Err(plot_error("invalid number of arguments")),
    };

    let function = eval_with_depth_tracking(function_expr, env, depth + 1)?;
    if !function.is_lambda() {
        return Err(plot_error("first argument is not a function"));
    }

    let range = eval_with_depth_tracking(bounds_expr, env, depth + 1)?;
    if !range.is_list() {
        return Err(plot_error("second argument is not a list"));
    }
    let [lower, upper] = range.tail() else {
        return Err(plot_error("second argument does not have 2 bounds"));
    };
    let (Some(lower), Some(upper)) = (lower.as_number(), upper.as_number()) else {
        return Err(plot_error("One or more bounds is not a number"));
    };
    if lower >= upper {
        return Err(plot_error("Lower bound is greater than upper bound"));
    }

    let options = match options_expr {
        Some(expr) => {
            let options = eval_with_depth_tracking(expr, env, depth + 1)?;
            if !options.is_list() {
                return Err(plot_error("third argument is not a list"));
            }
            Some(PlotOptions::parse(&options)?)
        }
        None => None,
    };

    let step = (upper - lower) / f64::from(SAMPLE_INTERVALS);
    let samples = (0..=SAMPLE_INTERVALS)
        .map(|i| {
            let x = lower + step * f64::from(i);
            sample(&function, x, env, depth).map(|y| (x, y))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let samples = smooth(&samples, &function, env, depth)?;
    log::debug!("continuous plot with {} vertices", samples.len());

    let Some(data_bounds) = Bounds::of(&samples) else {
        return Err(plot_error("no coordinates to plot"));
    };
    // The x extent is the requested interval, the y extent the sampled values
    let bounds = Bounds {
        min_x: lower,
        max_x: upper,
        ..data_bounds
    };

    let text_scale = options.as_ref().map_or(1.0, |options| options.text_scale);
    let mut scene = options
        .as_ref()
        .map(|options| option_labels(options, &bounds))
        .unwrap_or_default();
    scene.extend(
        samples
            .windows(2)
            .map(|pair| line(bounds.scaled(pair[0].0, pair[0].1), bounds.scaled(pair[1].0, pair[1].1))),
    );
    scene.extend(bounding_box(&bounds));
    scene.extend(origin_axes(&bounds));
    scene.extend(axis_labels(&bounds, text_scale));
    Ok(Expression::list(scene))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::evaluator::eval;
    use crate::parser::parse_str;

    fn run(program: &str) -> Result<Expression, Error> {
        let mut env = Environment::new();
        eval(&parse_str(program).unwrap(), &mut env)
    }

    fn count_named(scene: &Expression, name: &str) -> usize {
        scene
            .tail()
            .iter()
            .filter(|node| node.object_name() == Some(name))
            .count()
    }

    const DISCRETE: &str = r#"(begin
        (define f (lambda (x) (list x (+ (* 2 x) 1))))
        (discrete-plot (map f (range -2 2 0.5))
          (list (list "title" "The Title")
                (list "abscissa-label" "X Label")
                (list "ordinate-label" "Y Label")
                (list "text-scale" 1))))"#;

    #[test]
    fn test_discrete_plot_layout() {
        let scene = run(DISCRETE).unwrap();

        // 9 points, 4 box edges, 2 origin axes, 9 stems, 4 axis labels, 3 option labels
        assert_eq!(scene.tail().len(), 31);
        assert_eq!(count_named(&scene, "point"), 9);
        assert_eq!(count_named(&scene, "line"), 15);
        assert_eq!(count_named(&scene, "text"), 7);

        // x in [-2, 2], y in [-3, 5]: the first datum (-2, -3) lands at (-10, 7.5)
        let first = &scene.tail()[0];
        assert_eq!(first.as_coordinate(), Some((-10.0, 7.5)));
        assert_eq!(first.property("size"), Some(&Expression::from(0.5)));

        // Axis labels use two significant digits
        let labels: Vec<String> = scene.tail()[24..28]
            .iter()
            .map(|node| node.head().string_content().to_owned())
            .collect();
        assert_eq!(labels, vec!["-2", "-3", "5", "2"]);

        let title = &scene.tail()[28];
        assert_eq!(title.head().string_content(), "The Title");
        assert_eq!(
            title.property("position").and_then(Expression::as_coordinate),
            Some((0.0, -15.5))
        );

        let ordinate = &scene.tail()[30];
        assert_eq!(
            ordinate.property("rotation"),
            Some(&Expression::from(-std::f64::consts::FRAC_PI_2))
        );
    }

    #[test]
    fn test_discrete_plot_stems_use_nearest_bound() {
        let scene = run("(discrete-plot (list (list 1 2) (list 2 4)) (list))").unwrap();
        // 2 points, 4 box edges, no origin axes, 2 stems, 4 axis labels
        assert_eq!(scene.tail().len(), 12);

        // y range [2, 4]: the stem of (2, 4) starts at the minimum y
        let stem = &scene.tail()[7];
        let (from, to) = (&stem.tail()[0], &stem.tail()[1]);
        assert_eq!(from.as_coordinate(), Some((40.0, -20.0)));
        assert_eq!(to.as_coordinate(), Some((40.0, -40.0)));
    }

    #[test]
    fn test_continuous_plot_layout() {
        let scene = run(
            r#"(begin
                 (define f (lambda (x) (+ (* 2 x) 1)))
                 (continuous-plot f (list -2 2) (list (list "title" "A line"))))"#,
        )
        .unwrap();

        // 1 title, 50 segments, 4 box edges, 2 origin axes, 4 axis labels
        assert_eq!(scene.tail().len(), 61);
        assert_eq!(scene.tail()[0].head().string_content(), "A line");
        assert_eq!(count_named(&scene, "line"), 56);

        let no_options = run("(continuous-plot (lambda (x) (* 2 x)) (list 1 3))").unwrap();
        // 50 segments, 4 box edges, 4 axis labels; zero is outside both ranges
        assert_eq!(no_options.tail().len(), 58);
    }

    #[test]
    fn test_continuous_plot_smooths_sharp_vertices() {
        let mut env = Environment::new();
        let function = eval(&parse_str("(lambda (x) (* x x))").unwrap(), &mut env).unwrap();

        // A right angle at the middle vertex gets a midpoint on each side
        let samples = [(-1.0, 1.0), (0.0, 0.0), (1.0, 1.0)];
        let smoothed = smooth(&samples, &function, &env, 0).unwrap();
        assert_eq!(
            smoothed,
            vec![(-1.0, 1.0), (-0.5, 0.25), (0.0, 0.0), (0.5, 0.25), (1.0, 1.0)]
        );

        // Collinear samples are kept as they are
        let straight = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert_eq!(smooth(&straight, &function, &env, 0).unwrap(), straight.to_vec());
    }

    #[test]
    fn test_plot_errors() {
        let test_cases = [
            ("(discrete-plot (list))", "invalid number of arguments"),
            ("(discrete-plot 1 (list))", "Error: first argument is not a list on coordinates"),
            ("(discrete-plot (list (list 1)) (list))", "one or more coordinates were invalid"),
            ("(discrete-plot (list (list 1 \"a\")) (list))", "one or more coordinates were invalid"),
            ("(discrete-plot (list (list 1 2)) 3)", "second argument is not a list"),
            ("(discrete-plot (list (list 1 2)) (list 1))", "one or more options is not a list"),
            (
                "(discrete-plot (list (list 1 2)) (list (list \"title\")))",
                "one or more options has incorrect amount of properties",
            ),
            ("(discrete-plot (list (list 1 2)) (list (list 1 2)))", "Option type is not a string"),
            (
                "(discrete-plot (list (list 1 2)) (list (list \"text-scale\" \"big\")))",
                "Text-scale not given a number property",
            ),
            (
                "(discrete-plot (list (list 1 2)) (list (list \"text-scale\" 0)))",
                "Number value is not positive",
            ),
            ("(discrete-plot (list) (list))", "no coordinates to plot"),
            ("(continuous-plot 1 (list 0 1))", "first argument is not a function"),
            ("(continuous-plot (lambda (x) x) 1)", "second argument is not a list"),
            ("(continuous-plot (lambda (x) x) (list 1))", "second argument does not have 2 bounds"),
            ("(continuous-plot (lambda (x) x) (list 0 \"a\"))", "One or more bounds is not a number"),
            ("(continuous-plot (lambda (x) x) (list 1 0))", "Lower bound is greater than upper bound"),
            ("(continuous-plot (lambda (x) x) (list 0 1) 2)", "third argument is not a list"),
            ("(continuous-plot (lambda (x) (list x)) (list 0 1))", "function did not produce a number"),
            ("(continuous-plot (lambda (x y) x) (list 0 1))", "invalid number of arguments"),
        ];

        for (program, expected) in test_cases {
            let err = run(program).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{program}: expected '{expected}', got '{err}'"
            );
        }
    }
}
