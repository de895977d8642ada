/// UI layer: panels (navigation, filters, top bar) and chart rendering.
pub mod charts;
pub mod panels;
