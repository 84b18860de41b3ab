// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loader for Radiance Klems BSDF XML files.
//!
//! A Klems basis splits the hemisphere into theta rings, each subdivided
//! into equal-azimuth bins. Scattering data arrives as a dense
//! entry-by-entry matrix referencing the basis in declaration order; we
//! sort rings by upper theta on ingest and scatter the raw data through a
//! permutation vector into the sorted layout. Each component gets a
//! column-wise CDF for importance sampling of incoming directions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ember_core::math::{deg_to_rad, DenseMatrix, FLT_EPS, PI};
use ember_core::{FileSerializer, Serializer};

use crate::xml;
use crate::MeasuredError;

/// 16-byte alignment between the sub-sections of the exported binary.
const ALIGNMENT: usize = 4 * std::mem::size_of::<f32>();

/// One theta ring of a Klems basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KlemsThetaBasis {
    /// Ring center, radians.
    pub center_theta: f32,
    /// Lower ring bound, radians.
    pub lower_theta: f32,
    /// Upper ring bound, radians.
    pub upper_theta: f32,
    /// Number of equal-azimuth bins in this ring.
    pub phi_count: u32,
    /// Projected solid angle of a single bin.
    pub phi_solid_angle: f32,
}

impl KlemsThetaBasis {
    fn is_valid(&self) -> bool {
        self.phi_count > 0 && self.lower_theta < self.upper_theta
    }
}

/// An ordered hemisphere discretization.
#[derive(Debug, Default)]
pub struct KlemsBasis {
    theta_basis: Vec<KlemsThetaBasis>,
    theta_linear_offset: Vec<u32>,
    permutation: Vec<usize>,
    entry_count: u32,
}

impl KlemsBasis {
    fn add_basis(&mut self, basis: KlemsThetaBasis) {
        self.theta_basis.push(basis);
    }

    /// Sorts the rings by upper theta and builds the entry-level
    /// permutation that maps raw (declaration-order) entry indices into
    /// the sorted layout.
    fn setup(&mut self) {
        let n = self.theta_basis.len();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            self.theta_basis[a]
                .upper_theta
                .partial_cmp(&self.theta_basis[b].upper_theta)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Linear offsets over the declaration order, before sorting.
        let mut original_offsets = vec![0u32; n];
        let mut off = 0;
        for (i, basis) in self.theta_basis.iter().enumerate() {
            original_offsets[i] = off;
            off += basis.phi_count;
        }
        self.entry_count = off;

        // sorted_pos[original index] = position after sorting.
        let mut sorted_pos = vec![0usize; n];
        for (s, &o) in order.iter().enumerate() {
            sorted_pos[o] = s;
        }

        self.theta_basis
            .sort_by(|a, b| a.upper_theta.partial_cmp(&b.upper_theta).unwrap_or(std::cmp::Ordering::Equal));

        self.theta_linear_offset = vec![0u32; n];
        let mut off = 0;
        for (i, basis) in self.theta_basis.iter().enumerate() {
            self.theta_linear_offset[i] = off;
            off += basis.phi_count;
        }

        // Expand to entry level for fast scatter.
        self.permutation = vec![0usize; self.entry_count as usize];
        for o in 0..n {
            let s = sorted_pos[o];
            let count = self.theta_basis[s].phi_count;
            for j in 0..count {
                self.permutation[(original_offsets[o] + j) as usize] =
                    (self.theta_linear_offset[s] + j) as usize;
            }
        }
    }

    /// Total number of hemisphere bins.
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Number of theta rings.
    pub fn theta_count(&self) -> usize {
        self.theta_basis.len()
    }

    /// The sorted rings.
    pub fn theta_basis(&self) -> &[KlemsThetaBasis] {
        &self.theta_basis
    }

    /// Raw entry index to sorted entry index.
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Per-bin projected solid angles, expanded to entry level.
    fn entry_solid_angles(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.entry_count as usize);
        for basis in &self.theta_basis {
            for _ in 0..basis.phi_count {
                out.push(basis.phi_solid_angle);
            }
        }
        out
    }

    fn write<S: Serializer>(&self, os: &mut S) -> Result<(), ember_core::SerializerError> {
        for basis in &self.theta_basis {
            os.write_f32(basis.center_theta)?;
            os.write_f32(basis.lower_theta)?;
            os.write_f32(basis.upper_theta)?;
            os.write_u32(basis.phi_count)?;
        }
        os.write_pod_slice(&self.theta_linear_offset, true)?;
        // Trailing entry count doubles as the stride of the matrices that
        // follow.
        os.write_u32(self.entry_count)
    }
}

/// One directional component (e.g. front reflection): a scattering matrix
/// over a row basis (outgoing) and a column basis (incoming), plus its
/// sampling CDF.
#[derive(Debug)]
pub struct KlemsComponent {
    row_basis: Arc<KlemsBasis>,
    column_basis: Arc<KlemsBasis>,
    matrix: DenseMatrix,
    cdf: DenseMatrix,
}

impl KlemsComponent {
    /// Creates a black (all-zero) component over the given bases.
    pub fn new(row: Arc<KlemsBasis>, column: Arc<KlemsBasis>) -> Self {
        let rows = row.entry_count() as usize;
        let cols = column.entry_count() as usize;
        Self {
            row_basis: row,
            column_basis: column,
            matrix: DenseMatrix::zeros(rows, cols),
            cdf: DenseMatrix::zeros(rows, cols),
        }
    }

    /// The outgoing-direction basis.
    pub fn row(&self) -> &Arc<KlemsBasis> {
        &self.row_basis
    }

    /// The incoming-direction basis.
    pub fn column(&self) -> &Arc<KlemsBasis> {
        &self.column_basis
    }

    /// The scattering matrix.
    pub fn matrix(&self) -> &DenseMatrix {
        &self.matrix
    }

    /// The CDF matrix. After [`KlemsComponent::build_cdf_colwise`] it is
    /// stored transposed for memory-coherent sampling.
    pub fn cdf(&self) -> &DenseMatrix {
        &self.cdf
    }

    /// Builds a column-wise CDF: for each incoming column, the cumulative
    /// sum of `value * phi_solid_angle(row)` across rows, normalized so
    /// the last entry is exactly one. A column with a total at or below
    /// machine epsilon keeps division safe by normalizing against one.
    /// The finished matrix is transposed in place.
    pub fn build_cdf_colwise(&mut self) {
        let thetas: Vec<KlemsThetaBasis> = self.row_basis.theta_basis().to_vec();
        let rows = self.matrix.rows();
        for col in 0..self.matrix.cols() {
            let mut row = 0;
            for theta in &thetas {
                for _ in 0..theta.phi_count {
                    let value = self.matrix.at(row, col);
                    let prev = if row != 0 { self.cdf.at(row - 1, col) } else { 0.0 };
                    self.cdf.set(row, col, prev + value * theta.phi_solid_angle);
                    row += 1;
                }
            }
            debug_assert_eq!(row, rows, "cdf loop must cover every row");

            let mut mag = self.cdf.at(rows - 1, col);
            if mag <= FLT_EPS {
                mag = 1.0;
            }
            let norm = 1.0 / mag;
            for row in 0..rows {
                let v = self.cdf.at(row, col);
                self.cdf.set(row, col, v * norm);
            }
            // Force the last entry to one for precision.
            self.cdf.set(rows - 1, col, 1.0);
        }

        // For better memory alignment during sampling.
        self.cdf.transpose_in_place();
    }

    /// The integral of the component over both hemispheres.
    pub fn compute_total(&self) -> f32 {
        let row_sa = self.row_basis.entry_solid_angles();
        let col_sa = self.column_basis.entry_solid_angles();

        let mut sum = 0.0;
        for (r, &rs) in row_sa.iter().enumerate() {
            for (c, &cs) in col_sa.iter().enumerate() {
                sum += self.matrix.at(r, c) * rs * cs;
            }
        }
        sum
    }

    fn set_raw(&mut self, raw_row: usize, raw_col: usize, value: f32) {
        let row = self.row_basis.permutation()[raw_row];
        let col = self.column_basis.permutation()[raw_col];
        self.matrix.set(row, col, value);
    }

    fn write<S: Serializer>(&self, os: &mut S) -> Result<(), ember_core::SerializerError> {
        self.row_basis.write(os)?;
        os.write_alignment_pad(ALIGNMENT)?;
        self.column_basis.write(os)?;
        os.write_alignment_pad(ALIGNMENT)?;

        os.write_matrix(&self.matrix, false)?;
        os.write_matrix(&self.cdf, false)?;
        os.write_alignment_pad(ALIGNMENT)
    }
}

/// A full four-component Klems BSDF.
#[derive(Debug)]
pub struct Klems {
    /// Reflection seen from the front side.
    pub front_reflection: Arc<KlemsComponent>,
    /// Reflection seen from the back side.
    pub back_reflection: Arc<KlemsComponent>,
    /// Transmission entering from the front side.
    pub front_transmission: Arc<KlemsComponent>,
    /// Transmission entering from the back side.
    pub back_transmission: Arc<KlemsComponent>,
}

/// Shape and integral summary of one component, embedded into generated
/// shader code.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KlemsComponentSpecification {
    /// Theta ring counts of (row, column) basis.
    pub theta_count: (usize, usize),
    /// Entry counts of (row, column) basis.
    pub entry_count: (usize, usize),
    /// Integral of the component.
    pub total: f32,
}

/// Summary of all four components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KlemsSpecification {
    /// Front-side reflection summary.
    pub front_reflection: KlemsComponentSpecification,
    /// Back-side reflection summary.
    pub back_reflection: KlemsComponentSpecification,
    /// Front-side transmission summary.
    pub front_transmission: KlemsComponentSpecification,
    /// Back-side transmission summary.
    pub back_transmission: KlemsComponentSpecification,
}

impl Klems {
    /// Cheap check whether `path` looks like a Klems XML file.
    pub fn check(path: &Path) -> bool {
        let Ok(text) = xml::read_document(path) else {
            return false;
        };
        let Ok(doc) = roxmltree::Document::parse(&text) else {
            return false;
        };
        let Ok(layer) = xml::find_layer(path, &doc) else {
            return false;
        };
        let Some(datadef) = xml::child(layer, "DataDefinition") else {
            return false;
        };
        matches!(
            xml::child_value(datadef, "IncidentDataStructure"),
            Some("Rows") | Some("Columns")
        )
    }

    /// Loads and assembles all four components from a Radiance XML file.
    pub fn load(path: &Path) -> Result<Self, MeasuredError> {
        let text = xml::read_document(path)?;
        let doc = xml::parse_document(path, &text)?;
        let layer = xml::find_layer(path, &doc)?;

        let datadef = xml::child(layer, "DataDefinition")
            .ok_or_else(|| MeasuredError::format(path, "No DataDefinition tag"))?;

        let structure = xml::child_value(datadef, "IncidentDataStructure").unwrap_or("");
        let row_based = structure == "Rows";
        if !row_based && structure != "Columns" {
            return Err(MeasuredError::format(
                path,
                format!(
                    "Expected IncidentDataStructure of 'Columns' or 'Rows' but got '{structure}' instead"
                ),
            ));
        }

        let all_basis = parse_bases(path, datadef)?;
        if all_basis.is_empty() {
            return Err(MeasuredError::format(path, "No basis given"));
        }
        // Deterministic stand-in basis for missing reflection components.
        let first_basis = {
            let mut names: Vec<&String> = all_basis.keys().collect();
            names.sort();
            all_basis[names[0]].clone()
        };

        let mut reflection_front: Option<Arc<KlemsComponent>> = None;
        let mut transmission_front: Option<Arc<KlemsComponent>> = None;
        let mut reflection_back: Option<Arc<KlemsComponent>> = None;
        let mut transmission_back: Option<Arc<KlemsComponent>> = None;

        for block in xml::visible_blocks(path, layer)? {
            // Column basis indexes incoming, row basis outgoing directions.
            let column_name = xml::child_value(block, "ColumnAngleBasis").unwrap_or("");
            let row_name = xml::child_value(block, "RowAngleBasis").unwrap_or("");
            if column_name.is_empty() || row_name.is_empty() {
                return Err(MeasuredError::format(
                    path,
                    "WavelengthDataBlock has no column or row basis given",
                ));
            }

            let (Some(column_basis), Some(row_basis)) =
                (all_basis.get(column_name), all_basis.get(row_name))
            else {
                return Err(MeasuredError::format(
                    path,
                    "WavelengthDataBlock has no known column or row basis given",
                ));
            };

            let mut component =
                KlemsComponent::new(row_basis.clone(), column_basis.clone());

            ingest_scattering_data(path, block, row_based, &mut component)?;
            component.build_cdf_colwise();
            let component = Arc::new(component);

            // The window definition flips front & back.
            match xml::child_value(block, "WavelengthDataDirection").unwrap_or("") {
                "Transmission Front" => transmission_back = Some(component),
                "Scattering Back" | "Reflection Back" => reflection_front = Some(component),
                "Transmission Back" => transmission_front = Some(component),
                _ => reflection_back = Some(component),
            }
        }

        // Reflection components not given stay black.
        // See doc/notes/BSDFdirections.txt in Radiance for more information.
        let make_black = || {
            let mut black = KlemsComponent::new(first_basis.clone(), first_basis.clone());
            black.build_cdf_colwise();
            Arc::new(black)
        };
        let reflection_back = reflection_back.unwrap_or_else(make_black);
        let reflection_front = reflection_front.unwrap_or_else(make_black);

        // Both transmission sides stay equal unless specified otherwise.
        let near_zero =
            |c: &Option<Arc<KlemsComponent>>| c.as_ref().is_some_and(|c| c.compute_total() <= FLT_EPS);
        let transmission_back = if transmission_back.is_none()
            || (transmission_front.is_some() && near_zero(&transmission_back))
        {
            transmission_front.clone()
        } else {
            transmission_back
        };
        let transmission_front = if transmission_front.is_none()
            || (transmission_back.is_some() && near_zero(&transmission_front))
        {
            transmission_back.clone()
        } else {
            transmission_front
        };

        let (Some(transmission_front), Some(transmission_back)) =
            (transmission_front, transmission_back)
        else {
            return Err(MeasuredError::format(path, "No transmission data found"));
        };

        Ok(Self {
            front_reflection: reflection_front,
            back_reflection: reflection_back,
            front_transmission: transmission_front,
            back_transmission: transmission_back,
        })
    }

    /// Loads `in_xml` and, when `out_data` is given, exports the aligned
    /// binary the kernels map. Returns the shape summary either way.
    pub fn prepare(
        in_xml: &Path,
        out_data: Option<&Path>,
    ) -> Result<KlemsSpecification, MeasuredError> {
        let klems = Self::load(in_xml)?;

        let spec = KlemsSpecification {
            front_reflection: component_specification(&klems.front_reflection),
            front_transmission: component_specification(&klems.front_transmission),
            back_reflection: component_specification(&klems.back_reflection),
            back_transmission: component_specification(&klems.back_transmission),
        };

        if let Some(out_data) = out_data {
            // Note: Order matters!
            let mut serializer = FileSerializer::open(out_data, false)?;
            klems.front_reflection.write(&mut serializer)?;
            klems.front_transmission.write(&mut serializer)?;
            klems.back_reflection.write(&mut serializer)?;
            klems.back_transmission.write(&mut serializer)?;
        }

        Ok(spec)
    }
}

fn component_specification(component: &KlemsComponent) -> KlemsComponentSpecification {
    KlemsComponentSpecification {
        theta_count: (
            component.row().theta_count(),
            component.column().theta_count(),
        ),
        entry_count: (
            component.row().entry_count() as usize,
            component.column().entry_count() as usize,
        ),
        total: component.compute_total(),
    }
}

fn parse_bases(
    path: &Path,
    datadef: roxmltree::Node,
) -> Result<HashMap<String, Arc<KlemsBasis>>, MeasuredError> {
    let mut all_basis = HashMap::new();

    for anglebasis in datadef
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "AngleBasis")
    {
        let name = xml::child_value(anglebasis, "AngleBasisName")
            .ok_or_else(|| MeasuredError::format(path, "AngleBasis has no name"))?;

        let mut full_basis = KlemsBasis::default();
        for block in anglebasis
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == "AngleBasisBlock")
        {
            let bounds = xml::child(block, "ThetaBounds");
            let lower_theta = deg_to_rad(
                bounds
                    .and_then(|b| xml::child_value(b, "LowerTheta"))
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(0.0),
            );
            let upper_theta = deg_to_rad(
                bounds
                    .and_then(|b| xml::child_value(b, "UpperTheta"))
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(0.0),
            );
            let phi_count: u32 = xml::child_value(block, "nPhis")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0);

            let solid_a = lower_theta.cos();
            let solid_b = upper_theta.cos();
            let phi_solid_angle = if phi_count > 0 {
                PI * (solid_a * solid_a - solid_b * solid_b) / phi_count as f32
            } else {
                0.0
            };

            let center_theta = match xml::child_value(block, "Theta") {
                Some(t) => deg_to_rad(t.parse().unwrap_or(0.0)),
                None => (upper_theta + lower_theta) / 2.0,
            };

            let basis = KlemsThetaBasis {
                center_theta,
                lower_theta,
                upper_theta,
                phi_count,
                phi_solid_angle,
            };
            if !basis.is_valid() {
                return Err(MeasuredError::format(path, "Invalid AngleBasisBlock given"));
            }
            full_basis.add_basis(basis);
        }

        full_basis.setup();
        all_basis.insert(name.to_string(), Arc::new(full_basis));
    }

    Ok(all_basis)
}

fn ingest_scattering_data(
    path: &Path,
    block: roxmltree::Node,
    row_based: bool,
    component: &mut KlemsComponent,
) -> Result<(), MeasuredError> {
    let text = xml::child_value(block, "ScatteringData").unwrap_or("");
    let expected = component.matrix().size();
    let col_entries = component.column().entry_count() as usize;

    let mut did_warn_sign = false;
    let mut did_warn_finite = false;

    let mut ind = 0usize;
    for token in text.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        if ind >= expected {
            break; // Trailing data is ignored, a short stream is fatal.
        }

        let mut value: f32 = token.parse().map_err(|_| {
            MeasuredError::format(path, format!("Invalid scattering value '{token}'"))
        })?;

        if value.is_sign_negative() {
            value = 0.0;
            if !did_warn_sign {
                log::warn!(
                    "Data contains negative values in {}: Replacing them with 0",
                    path.display()
                );
                did_warn_sign = true;
            }
        }
        if !value.is_finite() {
            value = 0.0;
            if !did_warn_finite {
                log::warn!(
                    "Data contains non-finite values in {}: Replacing them with 0",
                    path.display()
                );
                did_warn_finite = true;
            }
        }

        let (row, col) = if row_based {
            (ind % col_entries, ind / col_entries)
        } else {
            (ind / col_entries, ind % col_entries)
        };
        component.set_raw(row, col, value);
        ind += 1;
    }

    if ind != expected {
        return Err(MeasuredError::format(
            path,
            format!("Given scattered data is not of length {expected}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    /// The full Klems basis: 9 theta rings, 145 bins.
    const KLEMS_PHI_COUNTS: [u32; 9] = [1, 8, 16, 20, 24, 24, 24, 16, 12];

    fn klems_xml(direction: &str, data: &str) -> String {
        let mut bounds = String::new();
        let step = 90.0 / KLEMS_PHI_COUNTS.len() as f32;
        for (i, phi) in KLEMS_PHI_COUNTS.iter().enumerate() {
            let lower = i as f32 * step;
            let upper = lower + step;
            bounds.push_str(&format!(
                "<AngleBasisBlock><ThetaBounds><LowerTheta>{lower}</LowerTheta>\
                 <UpperTheta>{upper}</UpperTheta></ThetaBounds><nPhis>{phi}</nPhis>\
                 </AngleBasisBlock>"
            ));
        }

        format!(
            "<WindowElement><Optical><Layer>\
             <DataDefinition>\
               <IncidentDataStructure>Columns</IncidentDataStructure>\
               <AngleBasis><AngleBasisName>LBNL/Klems Full</AngleBasisName>{bounds}</AngleBasis>\
             </DataDefinition>\
             <WavelengthData><Wavelength>Visible</Wavelength>\
               <WavelengthDataBlock>\
                 <ColumnAngleBasis>LBNL/Klems Full</ColumnAngleBasis>\
                 <RowAngleBasis>LBNL/Klems Full</RowAngleBasis>\
                 <WavelengthDataDirection>{direction}</WavelengthDataDirection>\
                 <ScatteringData>{data}</ScatteringData>\
               </WavelengthDataBlock>\
             </WavelengthData>\
             </Layer></Optical></WindowElement>"
        )
    }

    fn write_temp(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("klems.xml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    fn constant_data(entries: usize, value: f32) -> String {
        let mut out = String::with_capacity(entries * 4);
        for i in 0..entries {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format!("{value}"));
        }
        out
    }

    #[test]
    fn basis_is_sorted_and_counts_entries() {
        let xml = klems_xml("Transmission Front", &constant_data(145 * 145, 0.5));
        let (_dir, path) = write_temp(&xml);
        let klems = Klems::load(&path).unwrap();

        let basis = klems.front_transmission.column();
        assert_eq!(basis.entry_count(), 145);
        assert_eq!(basis.theta_count(), 9);
        for pair in basis.theta_basis().windows(2) {
            assert!(pair[0].upper_theta <= pair[1].upper_theta);
        }
        let total_phi: u32 = basis.theta_basis().iter().map(|t| t.phi_count).sum();
        assert_eq!(total_phi, basis.entry_count());
    }

    #[test]
    fn transmission_only_input_mirrors_and_zeroes() {
        // One negative value exercises the clamp-with-warning path.
        let mut data = constant_data(145 * 145, 0.5);
        data.replace_range(0..3, "-1 ");
        let xml = klems_xml("Transmission Front", &data);
        let (_dir, path) = write_temp(&xml);

        let klems = Klems::load(&path).unwrap();

        // The window convention is inverted: the data landed on the back
        // side and the front mirrors it.
        assert!(Arc::ptr_eq(&klems.front_transmission, &klems.back_transmission));
        assert!(klems.front_transmission.compute_total() > 0.0);

        // Missing reflection components are black.
        assert_eq!(klems.front_reflection.compute_total(), 0.0);
        assert_eq!(klems.back_reflection.compute_total(), 0.0);

        // The clamped value is zero, not negative.
        assert_eq!(klems.back_transmission.matrix().min_coeff(), 0.0);
    }

    #[test]
    fn unsorted_bases_scatter_through_the_permutation() {
        // Rings declared outer-first; ingest must land raw entries in the
        // sorted (inner-first) layout.
        let xml = "<WindowElement><Optical><Layer>\
            <DataDefinition>\
              <IncidentDataStructure>Columns</IncidentDataStructure>\
              <AngleBasis><AngleBasisName>Tiny</AngleBasisName>\
                <AngleBasisBlock><ThetaBounds><LowerTheta>45</LowerTheta>\
                  <UpperTheta>90</UpperTheta></ThetaBounds><nPhis>2</nPhis></AngleBasisBlock>\
                <AngleBasisBlock><ThetaBounds><LowerTheta>0</LowerTheta>\
                  <UpperTheta>45</UpperTheta></ThetaBounds><nPhis>1</nPhis></AngleBasisBlock>\
              </AngleBasis>\
            </DataDefinition>\
            <WavelengthData><Wavelength>Visible</Wavelength>\
              <WavelengthDataBlock>\
                <ColumnAngleBasis>Tiny</ColumnAngleBasis>\
                <RowAngleBasis>Tiny</RowAngleBasis>\
                <WavelengthDataDirection>Transmission Front</WavelengthDataDirection>\
                <ScatteringData>1 2 3 4 5 6 7 8 9</ScatteringData>\
              </WavelengthDataBlock>\
            </WavelengthData>\
            </Layer></Optical></WindowElement>";
        let (_dir, path) = write_temp(xml);
        let klems = Klems::load(&path).unwrap();

        let component = &klems.back_transmission;
        assert_eq!(component.column().permutation(), &[1, 2, 0]);

        // Raw entry (2, 2) = 9 maps to the sorted inner ring (0, 0).
        assert_eq!(component.matrix().at(0, 0), 9.0);
        // Raw entry (0, 0) = 1 maps to (1, 1).
        assert_eq!(component.matrix().at(1, 1), 1.0);
    }

    #[test]
    fn cdf_is_monotone_and_ends_at_one() {
        let xml = klems_xml("Transmission Front", &constant_data(145 * 145, 0.5));
        let (_dir, path) = write_temp(&xml);
        let klems = Klems::load(&path).unwrap();

        // Stored transposed: each row now holds one incoming column.
        let cdf = klems.back_transmission.cdf();
        for col in 0..cdf.rows() {
            let mut prev = 0.0;
            for row in 0..cdf.cols() {
                let v = cdf.at(col, row);
                assert!(v >= prev, "cdf must be non-decreasing");
                prev = v;
            }
            assert_relative_eq!(cdf.at(col, cdf.cols() - 1), 1.0);
        }
    }

    #[test]
    fn zero_columns_fall_back_to_a_safe_cdf() {
        let xml = klems_xml("Transmission Front", &constant_data(145 * 145, 0.0));
        let (_dir, path) = write_temp(&xml);
        let klems = Klems::load(&path).unwrap();

        let cdf = klems.back_transmission.cdf();
        for col in 0..cdf.rows() {
            assert_relative_eq!(cdf.at(col, cdf.cols() - 1), 1.0);
        }
    }

    #[test]
    fn missing_transmission_is_fatal() {
        let xml = klems_xml("Reflection Back", &constant_data(145 * 145, 0.5));
        let (_dir, path) = write_temp(&xml);
        match Klems::load(&path) {
            Err(MeasuredError::Format { message, .. }) => {
                assert!(message.contains("transmission"));
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn export_is_sixteen_byte_aligned_between_components() {
        let xml = klems_xml("Transmission Front", &constant_data(145 * 145, 0.5));
        let (dir, path) = write_temp(&xml);
        let out = dir.path().join("klems.bin");

        let spec = Klems::prepare(&path, Some(&out)).unwrap();
        assert_eq!(spec.front_transmission.entry_count, (145, 145));
        assert_relative_eq!(
            spec.front_transmission.total,
            spec.back_transmission.total
        );

        let len = std::fs::metadata(&out).unwrap().len();
        assert_eq!(len % 16, 0);

        // Basis section: 9 rings * 16 bytes, offsets, entry count. With
        // two bases, two pads, two 145x145 matrices and a final pad the
        // file must hold all four components.
        assert!(len > 4 * 2 * (145 * 145 * 4) as u64);
    }
}
