use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::poll::{io_common::*, *};

/// Reads the first and last names from an Excel worksheet whose first row is the header.
pub fn read_xlsx_names(path: &str, worksheet: Option<&str>) -> PollResult<Vec<NameRow>> {
    let wrange = get_range(path, worksheet)?;
    let mut rows = wrange.rows();

    let header: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .map(|c| read_cell(c, 1))
            .collect::<PollResult<Vec<String>>>()?,
        None => Vec::new(),
    };
    debug!("read_xlsx_names: header: {:?}", header);
    let (first_idx, last_idx) = column_indexes(&header, path)?;

    let mut res: Vec<NameRow> = Vec::new();
    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        debug!("read_xlsx_names: lineno: {:?} row: {:?}", lineno, row);
        let first_name = match row.get(first_idx) {
            Some(c) => read_cell(c, lineno)?,
            None => "".to_string(),
        };
        let last_name = match row.get(last_idx) {
            Some(c) => read_cell(c, lineno)?,
            None => "".to_string(),
        };
        res.push(NameRow {
            first_name,
            last_name,
        });
    }
    Ok(res)
}

fn read_cell(cell: &DataType, lineno: usize) -> PollResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Empty => Ok("".to_string()),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

fn get_range(path: &str, worksheet: Option<&str>) -> PollResult<Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet {
        workbook
            .worksheet_range(worksheet_name)
            .context(EmptyExcelSnafu {
                path,
                worksheet: worksheet_name,
            })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {
                path,
                worksheet: "#1",
            })?
            .context(OpeningExcelSnafu { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(read_cell(&DataType::String("Anna".to_string()), 2).unwrap(), "Anna");
        assert_eq!(read_cell(&DataType::Int(3), 2).unwrap(), "3");
        assert_eq!(read_cell(&DataType::Empty, 2).unwrap(), "");
        assert!(matches!(
            read_cell(&DataType::Bool(true), 4),
            Err(PollError::ExcelWrongCellType { lineno: 4, .. })
        ));
    }

    #[test]
    fn missing_workbook() {
        assert!(matches!(
            read_xlsx_names("/nonexistent/candidati.xlsx", None),
            Err(PollError::OpeningExcel { .. })
        ));
    }
}
