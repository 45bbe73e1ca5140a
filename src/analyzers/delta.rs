use std::collections::BTreeMap;

use crate::analyzers::style::{DELTA_PREFIX, Layer, StyleDict, delta_layer_name};

/// Month-over-month differences per cell. The first month is all zeros and a
/// cell absent in the previous month counts as zero there.
pub fn delta_layer(layer: &Layer) -> Layer {
    let mut previous: Option<&BTreeMap<_, f64>> = None;
    let mut deltas = Layer::new();

    for (month, values) in layer {
        let frame = values
            .iter()
            .map(|(cell, value)| {
                let delta = match previous {
                    None => 0.0,
                    Some(prev) => value - prev.get(cell).copied().unwrap_or(0.0),
                };
                (*cell, delta)
            })
            .collect();
        deltas.insert(*month, frame);
        previous = Some(values);
    }

    deltas
}

/// Adds a `delta_<name>` layer for every layer that is not itself a delta.
pub fn add_deltas(style: &mut StyleDict) {
    let computed: Vec<(String, Layer)> = style
        .layers()
        .filter(|(name, _)| !name.starts_with(DELTA_PREFIX))
        .map(|(name, layer)| (delta_layer_name(name), delta_layer(layer)))
        .collect();

    for (name, layer) in computed {
        style.insert(name, layer);
    }
}
