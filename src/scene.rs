//! Typed render primitives extracted from evaluation results.
//!
//! A display layer draws every node tagged with an `object-name` of `point`, `line` or
//! `text`. [`primitives`] finds those nodes (descending into untagged nodes such as the
//! list returned by a plot), checks the properties each kind needs and returns them as
//! [`Primitive`] values that serialize to JSON.

use crate::Error;
use crate::atom::Atom;
use crate::expression::Expression;
use serde::Serialize;

/// Something a display layer can draw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Primitive {
    /// Filled circle of diameter `size` centred on `(x, y)`
    Point { x: f64, y: f64, size: f64 },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        thickness: f64,
    },
    /// Text centred on `(x, y)`; `rotation` is in radians
    Text {
        content: String,
        x: f64,
        y: f64,
        scale: f64,
        rotation: f64,
    },
}

fn invalid(message: &str) -> Error {
    Error::PlotError(message.to_owned())
}

/// Number stored under `key`, if there is one
fn number_property(expr: &Expression, key: &str) -> Option<f64> {
    expr.property(key).and_then(Expression::as_number)
}

fn point(expr: &Expression) -> Result<Primitive, Error> {
    let [x, y] = expr.tail() else {
        return Err(invalid("Point does not have correct number of coordinates"));
    };
    let (Some(x), Some(y)) = (x.as_number(), y.as_number()) else {
        return Err(invalid("One or more coordinates are not numbers"));
    };
    let size = match expr.property("size") {
        None => return Err(invalid("Point has no property for size")),
        Some(size) => size
            .as_number()
            .ok_or_else(|| invalid("Size property is not number"))?,
    };
    if size < 0.0 {
        return Err(invalid("Size property is less than 0"));
    }
    Ok(Primitive::Point { x, y, size })
}

fn line(expr: &Expression) -> Result<Primitive, Error> {
    let [from, to] = expr.tail() else {
        return Err(invalid("Line does not have correct number of points"));
    };
    let (Some(from), Some(to)) = (from.as_coordinate(), to.as_coordinate()) else {
        return Err(invalid("One or more line endpoints are not points"));
    };
    let thickness = match expr.property("thickness") {
        None => return Err(invalid("Line has no property for thickness")),
        Some(thickness) => thickness
            .as_number()
            .ok_or_else(|| invalid("Thickness property is not number"))?,
    };
    if thickness < 0.0 {
        return Err(invalid("Thickness property is less than 0"));
    }
    Ok(Primitive::Line {
        from,
        to,
        thickness,
    })
}

fn text(expr: &Expression) -> Result<Primitive, Error> {
    if !expr.tail().is_empty() || !matches!(expr.head(), Atom::String(_)) {
        return Err(invalid("Text expected a string value"));
    }
    let Some(position) = expr.property("position") else {
        return Err(invalid("Text has no property for position"));
    };
    let Some((x, y)) = position.as_coordinate() else {
        return Err(invalid("Position property is not a point"));
    };

    // Unusable scale or rotation values fall back to the defaults
    let scale = number_property(expr, "scale")
        .filter(|scale| *scale > 0.0)
        .unwrap_or(1.0);
    let rotation = number_property(expr, "rotation").unwrap_or(0.0);

    Ok(Primitive::Text {
        content: expr.head().string_content().to_owned(),
        x,
        y,
        scale,
        rotation,
    })
}

fn collect(expr: &Expression, out: &mut Vec<Primitive>) -> Result<(), Error> {
    match expr.object_name() {
        Some("point") => out.push(point(expr)?),
        Some("line") => out.push(line(expr)?),
        Some("text") => out.push(text(expr)?),
        Some(other) => log::debug!("skipping node with unknown object-name {other}"),
        None if expr.is_lambda() => {}
        None => {
            for child in expr.tail() {
                collect(child, out)?;
            }
        }
    }
    Ok(())
}

/// All render primitives in an evaluation result, in display order
pub fn primitives(expr: &Expression) -> Result<Vec<Primitive>, Error> {
    let mut out = Vec::new();
    collect(expr, &mut out)?;
    Ok(out)
}

/// The render primitives of an evaluation result as a JSON array
pub fn to_json(expr: &Expression) -> Result<String, Error> {
    let primitives = primitives(expr)?;
    serde_json::to_string(&primitives)
        .map_err(|err| Error::EvalError(format!("could not serialize scene: {err}")))
}
