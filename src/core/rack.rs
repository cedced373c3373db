use crate::domain::model::{Cabinet, Device};

/// Rows are `width - 1` long: the 6-column `|Uxxx|` gutter, the body, `|`.
const GUTTER: usize = 8;
const MIN_BODY: usize = 4;
/// Taller cabinets are drawn clipped to this many units.
pub const MAX_RACK_UNITS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Device(usize),
}

/// Draw a rack elevation of `cabinet`, top unit first.
///
/// Each top-level device becomes a framed block labelled on its bottom unit;
/// devices mounted inside a chassis are listed after the chassis label.
pub fn render_rack(cabinet: &Cabinet, devices: &[Device], width: usize) -> Vec<String> {
    let body = width.saturating_sub(GUTTER).max(MIN_BODY);
    let height = cabinet.height.min(MAX_RACK_UNITS);

    // slots[u] 為第 u 個 U 的佔用情況，索引 0 不使用
    let mut slots = vec![Slot::Empty; height as usize + 1];
    for (index, device) in devices.iter().enumerate() {
        if !device.is_top_level() || device.position == 0 || device.position > height {
            continue;
        }
        let bottom = device.position as usize;
        let top = device
            .position
            .saturating_add(device.height.max(1) - 1)
            .min(height) as usize;
        for slot in slots.iter_mut().take(top + 1).skip(bottom) {
            if *slot == Slot::Empty {
                *slot = Slot::Device(index);
            }
        }
    }

    let border = format!("+----+{}+", "-".repeat(body));
    let mut lines = vec![border.clone()];

    let mut unit = height as usize;
    while unit >= 1 {
        let slot = slots[unit];
        let mut units = vec![unit];
        while unit > 1 && slots[unit - 1] == slot {
            unit -= 1;
            units.push(unit);
        }
        unit -= 1;

        let bottom = units.last().copied().unwrap_or(0);
        for (i, &u) in units.iter().enumerate() {
            if i > 0 {
                lines.push(row("    ", &cell(slot, None, body)));
            }
            let text = match slot {
                Slot::Device(index) if u == bottom => Some(device_text(&devices[index], devices)),
                _ => None,
            };
            lines.push(row(&format!("U{:03}", u), &cell(slot, text.as_deref(), body)));
        }
        lines.push(border.clone());
    }

    lines
}

fn row(gutter: &str, body: &str) -> String {
    format!("|{}|{}|", gutter, body)
}

fn cell(slot: Slot, text: Option<&str>, body: usize) -> String {
    match slot {
        Slot::Empty => " ".repeat(body),
        Slot::Device(_) => {
            let inner = body - 2;
            let content: String = text
                .map(|t| format!(" {}", t))
                .unwrap_or_default()
                .chars()
                .take(inner)
                .collect();
            format!("|{:<inner$}|", content, inner = inner)
        }
    }
}

fn device_text(device: &Device, all: &[Device]) -> String {
    let children: Vec<&str> = all
        .iter()
        .filter(|d| d.parent_device == device.id && d.id != device.id)
        .map(|d| d.label.as_str())
        .collect();
    if children.is_empty() {
        device.label.clone()
    } else {
        format!("{} ({})", device.label, children.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: u64, label: &str, position: u64, height: u64, parent: u64) -> Device {
        Device {
            id,
            label: label.to_string(),
            cabinet: 1,
            position,
            height,
            parent_device: parent,
            ..Device::default()
        }
    }

    fn cabinet(height: u64) -> Cabinet {
        Cabinet {
            id: 1,
            datacenter_id: 1,
            location: "A01".to_string(),
            height,
        }
    }

    #[test]
    fn test_render_cabinet_with_chassis() {
        let devices = vec![
            device(2, "node102", 2, 1, 0),
            device(5, "node104", 1, 1, 3),
            device(3, "chassisA", 4, 2, 0),
            device(1, "node101", 1, 1, 0),
            device(4, "node103", 1, 1, 3),
        ];

        let expected = vec![
            "+----+--------------------------------+",
            "|U010|                                |",
            "|    |                                |",
            "|U009|                                |",
            "|    |                                |",
            "|U008|                                |",
            "|    |                                |",
            "|U007|                                |",
            "|    |                                |",
            "|U006|                                |",
            "+----+--------------------------------+",
            "|U005||                              ||",
            "|    ||                              ||",
            "|U004|| chassisA (node104, node103)  ||",
            "+----+--------------------------------+",
            "|U003|                                |",
            "+----+--------------------------------+",
            "|U002|| node102                      ||",
            "+----+--------------------------------+",
            "|U001|| node101                      ||",
            "+----+--------------------------------+",
        ];

        assert_eq!(render_rack(&cabinet(10), &devices, 40), expected);
    }

    #[test]
    fn test_long_label_is_truncated() {
        let devices = vec![device(1, "a-very-long-device-label", 1, 1, 0)];
        let lines = render_rack(&cabinet(1), &devices, 20);
        assert_eq!(lines[1], "|U001|| a-very-lo||");
        assert!(lines.iter().all(|l| l.len() == 19));
    }

    #[test]
    fn test_empty_cabinet() {
        let lines = render_rack(&cabinet(2), &[], 16);
        assert_eq!(
            lines,
            vec![
                "+----+--------+",
                "|U002|        |",
                "|    |        |",
                "|U001|        |",
                "+----+--------+",
            ]
        );
    }

    #[test]
    fn test_out_of_range_numbers_are_ignored() {
        let devices = vec![
            device(1, "lost", u64::MAX, 2, 0),
            device(2, "huge", 2, u64::MAX, 0),
            device(3, "above", 5, 1, 0),
        ];
        let lines = render_rack(&cabinet(4), &devices, 16);

        assert_eq!(lines.len(), 9);
        assert_eq!(lines[1], "|U004||      ||");
        assert_eq!(lines[5], "|U002|| huge ||");
        assert_eq!(lines[7], "|U001|        |");
        assert!(!lines.iter().any(|l| l.contains("lost") || l.contains("above")));
    }

    #[test]
    fn test_absurd_cabinet_height_is_capped() {
        let lines = render_rack(&cabinet(u64::MAX), &[], 16);
        assert_eq!(lines.len(), 2 * MAX_RACK_UNITS as usize + 1);
        assert_eq!(lines[1], "|U100|        |");
    }

    #[test]
    fn test_device_above_cabinet_top_is_clipped() {
        let devices = vec![device(1, "tall", 2, 4, 0)];
        let lines = render_rack(&cabinet(3), &devices, 16);
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[1], "|U003||      ||");
        assert_eq!(lines[3], "|U002|| tall ||");
        assert_eq!(lines[5], "|U001|        |");
    }
}
