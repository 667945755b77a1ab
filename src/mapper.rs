//! Canvas-to-device address translation.
//!
//! The canvas is cut into equally sized tile panels. Each panel is one
//! PCA9685 bank, and each tile inside a panel is one channel on that bank.
//! How panels are numbered across the canvas and how servos are wired inside
//! a panel are both data on [`Topology`], not baked into the formula.

use crate::error::{Error, Result};
use crate::pca9685::CHANNELS;
use serde::{Deserialize, Serialize};

// ── Raster order ─────────────────────────────────────────────────────

/// Order in which items of a grid are numbered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterOrder {
    /// Left to right, then the next row down.
    #[default]
    RowMajor,
    /// Top to bottom, then the next column right.
    ColumnMajor,
}

impl RasterOrder {
    /// Index of `(row, col)` in a `width x height` grid numbered in this order.
    fn index(self, row: usize, col: usize, width: usize, height: usize) -> usize {
        match self {
            RasterOrder::RowMajor => row * width + col,
            RasterOrder::ColumnMajor => col * height + row,
        }
    }
}

// ── Addresses and topology ───────────────────────────────────────────

/// Physical location of one servo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress {
    pub bank: usize,
    pub channel: u8,
}

/// Static layout of the canvas, its tile panels, and the PWM banks behind them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Topology {
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    pub channels_per_bank: usize,
    /// How tile panels are numbered across the canvas.
    pub panel_order: RasterOrder,
    /// How servos are wired to channels inside one panel.
    pub tile_wiring: RasterOrder,
    /// I2C address of each bank, indexed by bank number.
    pub bank_addresses: Vec<u8>,
}

impl Default for Topology {
    /// The original build: three 4x4 panels side by side, wired column by
    /// column inside each panel.
    ///
    /// ```text
    ///  0  4  8 12
    ///  1  5  9 13
    ///  2  6 10 14
    ///  3  7 11 15
    /// ```
    fn default() -> Self {
        Self {
            canvas_width: 12,
            canvas_height: 4,
            tile_width: 4,
            tile_height: 4,
            channels_per_bank: 16,
            panel_order: RasterOrder::RowMajor,
            tile_wiring: RasterOrder::ColumnMajor,
            bank_addresses: vec![0x40, 0x41, 0x42],
        }
    }
}

// ── Mapping ──────────────────────────────────────────────────────────

impl Topology {
    pub fn pixel_count(&self) -> usize {
        self.canvas_width * self.canvas_height
    }

    /// Number of tile panels across the canvas.
    pub fn panels_across(&self) -> usize {
        self.canvas_width / self.tile_width
    }

    /// Number of tile panels down the canvas.
    pub fn panels_down(&self) -> usize {
        self.canvas_height / self.tile_height
    }

    pub fn bank_count(&self) -> usize {
        self.panels_across() * self.panels_down()
    }

    /// Servos per tile panel.
    pub fn tiles_per_panel(&self) -> usize {
        self.tile_width * self.tile_height
    }

    /// Check the dimension relationships the mapper relies on.
    pub fn validate(&self) -> Result<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(Error::InvalidTopology("canvas must not be empty".into()));
        }
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(Error::InvalidTopology("tile panel must not be empty".into()));
        }
        if self.canvas_width % self.tile_width != 0 || self.canvas_height % self.tile_height != 0 {
            return Err(Error::InvalidTopology(format!(
                "canvas {}x{} is not a multiple of tile panel {}x{}",
                self.canvas_width, self.canvas_height, self.tile_width, self.tile_height
            )));
        }
        if self.tiles_per_panel() > self.channels_per_bank {
            return Err(Error::InvalidTopology(format!(
                "tile panel has {} servos but a bank only has {} channels",
                self.tiles_per_panel(),
                self.channels_per_bank
            )));
        }
        if self.channels_per_bank > usize::from(CHANNELS) {
            return Err(Error::InvalidTopology(format!(
                "{} channels per bank, but a PCA9685 only has {CHANNELS}",
                self.channels_per_bank
            )));
        }
        if self.bank_addresses.len() != self.bank_count() {
            return Err(Error::InvalidTopology(format!(
                "layout needs {} banks but {} addresses are configured",
                self.bank_count(),
                self.bank_addresses.len()
            )));
        }
        Ok(())
    }

    /// Translate a canvas cell into the bank and channel driving its servo.
    pub fn map_canvas_to_device(&self, row: usize, col: usize) -> Result<DeviceAddress> {
        if row >= self.canvas_height || col >= self.canvas_width {
            return Err(Error::OutOfRange {
                row,
                col,
                width: self.canvas_width,
                height: self.canvas_height,
            });
        }

        let bank = self.panel_order.index(
            row / self.tile_height,
            col / self.tile_width,
            self.panels_across(),
            self.panels_down(),
        );
        let channel = self.tile_wiring.index(
            row % self.tile_height,
            col % self.tile_width,
            self.tile_width,
            self.tile_height,
        );
        let channel = u8::try_from(channel).map_err(|_| Error::OutOfRange {
            row,
            col,
            width: self.canvas_width,
            height: self.canvas_height,
        })?;

        Ok(DeviceAddress { bank, channel })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashSet;

    fn topology(
        canvas: (usize, usize),
        tile: (usize, usize),
        panel_order: RasterOrder,
        tile_wiring: RasterOrder,
    ) -> Topology {
        let mut t = Topology {
            canvas_width: canvas.0,
            canvas_height: canvas.1,
            tile_width: tile.0,
            tile_height: tile.1,
            panel_order,
            tile_wiring,
            ..Topology::default()
        };
        t.bank_addresses = (0..t.bank_count()).map(|i| 0x40 + i as u8).collect();
        t
    }

    // ── Mapping tests ──────────────────────────────────────────────

    #[test]
    fn default_topology_is_valid() {
        let t = Topology::default();
        t.validate().unwrap();
        assert_eq!(t.bank_count(), 3);
        assert_eq!(t.pixel_count(), 48);
    }

    #[rstest]
    #[case(0, 0, 0, 0)]
    #[case(0, 5, 1, 4)]
    #[case(3, 0, 0, 3)]
    #[case(0, 3, 0, 12)]
    #[case(3, 3, 0, 15)]
    #[case(2, 9, 2, 6)]
    #[case(3, 11, 2, 15)]
    fn default_wiring(
        #[case] row: usize,
        #[case] col: usize,
        #[case] bank: usize,
        #[case] channel: u8,
    ) {
        let addr = Topology::default().map_canvas_to_device(row, col).unwrap();
        assert_eq!(addr, DeviceAddress { bank, channel });
    }

    #[rstest]
    #[case(4, 0)]
    #[case(0, 12)]
    #[case(100, 100)]
    fn out_of_range_cell_is_rejected(#[case] row: usize, #[case] col: usize) {
        let err = Topology::default().map_canvas_to_device(row, col).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { row: r, col: c, .. } if r == row && c == col));
    }

    #[rstest]
    #[case((12, 4), (4, 4), RasterOrder::RowMajor, RasterOrder::ColumnMajor)]
    #[case((8, 8), (4, 4), RasterOrder::RowMajor, RasterOrder::ColumnMajor)]
    #[case((8, 8), (4, 4), RasterOrder::ColumnMajor, RasterOrder::RowMajor)]
    #[case((6, 4), (3, 2), RasterOrder::ColumnMajor, RasterOrder::ColumnMajor)]
    #[case((4, 12), (4, 4), RasterOrder::RowMajor, RasterOrder::RowMajor)]
    fn mapping_is_a_bijection(
        #[case] canvas: (usize, usize),
        #[case] tile: (usize, usize),
        #[case] panel_order: RasterOrder,
        #[case] tile_wiring: RasterOrder,
    ) {
        let t = topology(canvas, tile, panel_order, tile_wiring);
        t.validate().unwrap();

        let mut seen = HashSet::new();
        for row in 0..t.canvas_height {
            for col in 0..t.canvas_width {
                let addr = t.map_canvas_to_device(row, col).unwrap();
                assert!(addr.bank < t.bank_count());
                assert!(usize::from(addr.channel) < t.tiles_per_panel());
                assert!(seen.insert(addr), "{addr:?} mapped twice");
            }
        }
        assert_eq!(seen.len(), t.bank_count() * t.tiles_per_panel());
    }

    #[test]
    fn column_major_panels_number_down_first() {
        let t = topology((8, 8), (4, 4), RasterOrder::ColumnMajor, RasterOrder::ColumnMajor);
        assert_eq!(t.map_canvas_to_device(4, 0).unwrap().bank, 1);
        assert_eq!(t.map_canvas_to_device(0, 4).unwrap().bank, 2);
    }

    #[test]
    fn row_major_wiring_runs_across_first() {
        let t = topology((12, 4), (4, 4), RasterOrder::RowMajor, RasterOrder::RowMajor);
        assert_eq!(t.map_canvas_to_device(0, 1).unwrap().channel, 1);
        assert_eq!(t.map_canvas_to_device(1, 0).unwrap().channel, 4);
    }

    // ── Validation tests ───────────────────────────────────────────

    #[test]
    fn canvas_not_multiple_of_tile_is_invalid() {
        let mut t = Topology::default();
        t.canvas_width = 10;
        assert!(matches!(t.validate(), Err(Error::InvalidTopology(_))));
    }

    #[test]
    fn too_many_servos_per_bank_is_invalid() {
        let mut t = Topology::default();
        t.channels_per_bank = 8;
        assert!(matches!(t.validate(), Err(Error::InvalidTopology(_))));
    }

    #[test]
    fn banks_wider_than_a_pca9685_are_invalid() {
        let t = Topology {
            canvas_width: 8,
            canvas_height: 4,
            tile_width: 8,
            tile_height: 4,
            channels_per_bank: 32,
            bank_addresses: vec![0x40],
            ..Topology::default()
        };
        assert!(matches!(t.validate(), Err(Error::InvalidTopology(_))));
    }

    #[test]
    fn unaddressable_channel_is_out_of_range() {
        // Never validated: 32x16 tiles need channels up to 511.
        let t = Topology {
            canvas_width: 32,
            canvas_height: 16,
            tile_width: 32,
            tile_height: 16,
            channels_per_bank: 512,
            bank_addresses: vec![0x40],
            ..Topology::default()
        };
        assert!(matches!(
            t.map_canvas_to_device(0, 31),
            Err(Error::OutOfRange { row: 0, col: 31, .. })
        ));
        assert_eq!(t.map_canvas_to_device(15, 0).unwrap().channel, 15);
    }

    #[test]
    fn bank_address_count_must_match_layout() {
        let mut t = Topology::default();
        t.bank_addresses.pop();
        assert!(matches!(t.validate(), Err(Error::InvalidTopology(_))));
    }
}
